use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

use boardsync::model::{BoardState, Record, RemoteTarget};
use boardsync::store::LocalStore;

mod common;

fn run_boardsync(cwd: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new(env!("CARGO_BIN_EXE_boardsync"))
        .current_dir(cwd)
        .args(args)
        .output()
        .with_context(|| format!("run boardsync {:?} in {}", args, cwd.display()))?;

    if !out.status.success() {
        anyhow::bail!(
            "boardsync {:?} failed (status {:?})\nstdout:\n{}\nstderr:\n{}",
            args,
            out.status,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}

fn run_boardsync_expecting_failure(cwd: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new(env!("CARGO_BIN_EXE_boardsync"))
        .current_dir(cwd)
        .args(args)
        .output()
        .with_context(|| format!("run boardsync {:?} in {}", args, cwd.display()))?;

    if out.status.success() {
        anyhow::bail!("boardsync {:?} unexpectedly succeeded", args);
    }
    Ok(String::from_utf8_lossy(&out.stderr).to_string())
}

fn seed_board(cwd: &Path, task_ids: &[&str]) -> Result<LocalStore> {
    let store = LocalStore::open(&cwd.join(".boardsync"))?;
    let mut board = BoardState::default();
    board.tasks = task_ids
        .iter()
        .map(|id| Record::from(serde_json::json!({"id": id, "title": format!("task {}", id)})))
        .collect();
    store.save_board(&board)?;
    Ok(store)
}

#[test]
fn cli_help_surface_is_stable() -> Result<()> {
    let temp = tempfile::tempdir().context("tempdir")?;
    let help = run_boardsync(temp.path(), &["--help"])?;
    assert!(help.contains("Usage: boardsync"));
    assert!(help.contains("create"));
    assert!(help.contains("join"));
    assert!(help.contains("run"));
    assert!(help.contains("status"));
    assert!(help.contains("export"));
    assert!(help.contains("import"));
    assert!(help.contains("backup-dir"));
    assert!(help.contains("open"));
    Ok(())
}

#[test]
fn create_and_join_share_a_document_over_http() -> Result<()> {
    let server = common::spawn_server()?;
    let ws1 = tempfile::tempdir().context("create ws1")?;
    let ws2 = tempfile::tempdir().context("create ws2")?;

    let store1 = seed_board(ws1.path(), &["t1"])?;

    let out = run_boardsync(ws1.path(), &["create", "--url", &server.docs_url()])?;
    assert!(out.contains("Created shared document"), "stdout: {}", out);

    // The assigned id landed in settings.
    let settings = store1.load_settings()?;
    let Some(RemoteTarget::Blob {
        doc_id: Some(doc_id),
        ..
    }) = settings.remote
    else {
        anyhow::bail!("create did not persist the document id");
    };

    let out = run_boardsync(
        ws2.path(),
        &["join", "--url", &server.docs_url(), "--doc", &doc_id],
    )?;
    assert!(out.contains("Joined"), "stdout: {}", out);
    assert!(out.contains("1 records"), "stdout: {}", out);

    let store2 = LocalStore::open(&ws2.path().join(".boardsync"))?;
    let board2 = store2.load_board()?;
    assert_eq!(board2.tasks.len(), 1);
    assert_eq!(board2.tasks[0].id(), Some("t1"));

    Ok(())
}

#[test]
fn join_requires_a_document_id_for_http_remotes() -> Result<()> {
    let ws = tempfile::tempdir().context("create ws")?;
    let stderr =
        run_boardsync_expecting_failure(ws.path(), &["join", "--url", "http://localhost:9/docs"])?;
    assert!(stderr.contains("--doc"), "stderr: {}", stderr);
    Ok(())
}

#[test]
fn create_and_join_share_a_document_through_a_file() -> Result<()> {
    let ws1 = tempfile::tempdir().context("create ws1")?;
    let ws2 = tempfile::tempdir().context("create ws2")?;
    let shared = tempfile::tempdir().context("create shared dir")?;
    let shared_file = shared.path().join("board.json");
    let shared_arg = shared_file.to_str().context("utf8 path")?;

    seed_board(ws1.path(), &["t1", "t2"])?;

    run_boardsync(ws1.path(), &["create", "--file", shared_arg])?;
    assert!(shared_file.is_file());

    let out = run_boardsync(ws2.path(), &["join", "--file", shared_arg])?;
    assert!(out.contains("2 records"), "stdout: {}", out);

    Ok(())
}

#[test]
fn status_reports_the_board_as_json() -> Result<()> {
    let ws = tempfile::tempdir().context("create ws")?;
    seed_board(ws.path(), &["t1", "t2", "t3"])?;

    let out = run_boardsync(ws.path(), &["status", "--json"])?;
    let status: serde_json::Value = serde_json::from_str(&out).context("parse status json")?;

    assert_eq!(status["board"]["tasks"], 3);
    assert_eq!(status["remote"], serde_json::Value::Null);
    assert_eq!(status["backup"], serde_json::Value::Null);

    Ok(())
}

#[test]
fn export_then_import_restores_the_board() -> Result<()> {
    let ws = tempfile::tempdir().context("create ws")?;
    let store = seed_board(ws.path(), &["t1", "t2"])?;

    let export_path = ws.path().join("snapshot.json");
    let out = run_boardsync(
        ws.path(),
        &["export", "--out", export_path.to_str().context("utf8 path")?],
    )?;
    assert!(out.contains("Exported 2 records"), "stdout: {}", out);

    // Wreck the live board.
    store.save_board(&BoardState::default())?;

    let out = run_boardsync(
        ws.path(),
        &["import", export_path.to_str().context("utf8 path")?],
    )?;
    assert!(out.contains("Imported 2 records"), "stdout: {}", out);

    let restored = store.load_board()?;
    assert_eq!(restored.tasks.len(), 2);

    Ok(())
}

#[test]
fn backup_dir_links_a_folder_into_settings() -> Result<()> {
    let ws = tempfile::tempdir().context("create ws")?;
    let backups = ws.path().join("my-backups");

    let out = run_boardsync(
        ws.path(),
        &["backup-dir", backups.to_str().context("utf8 path")?],
    )?;
    assert!(out.contains("Daily backups"), "stdout: {}", out);
    assert!(backups.is_dir());

    let store = LocalStore::open(&ws.path().join(".boardsync"))?;
    let settings = store.load_settings()?;
    let backup = settings.backup.context("backup settings missing")?;
    assert_eq!(backup.dir, backups);
    assert_eq!(backup.prefix, "board_backup");

    Ok(())
}

#[test]
fn open_summarizes_a_snapshot_without_touching_the_board() -> Result<()> {
    let ws = tempfile::tempdir().context("create ws")?;
    let store = seed_board(ws.path(), &["live"])?;

    // A historical export with different content.
    let mut old = BoardState::default();
    old.tasks = vec![
        Record::from(serde_json::json!({"id": "old1", "title": "old"})),
        Record::from(serde_json::json!({"id": "old2", "title": "old"})),
    ];
    let snapshot_path = ws.path().join("old.json");
    store.export_board(&old, &snapshot_path)?;

    let out = run_boardsync(
        ws.path(),
        &["open", snapshot_path.to_str().context("utf8 path")?],
    )?;
    assert!(out.contains("read-only"), "stdout: {}", out);
    assert!(out.contains("tasks=2"), "stdout: {}", out);

    // The live board is untouched.
    let live = store.load_board()?;
    assert_eq!(live.tasks.len(), 1);
    assert_eq!(live.tasks[0].id(), Some("live"));

    Ok(())
}
