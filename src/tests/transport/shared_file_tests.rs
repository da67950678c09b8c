use tempfile::tempdir;

use super::*;

#[tokio::test]
async fn pull_reports_a_missing_file_as_absent() {
    let temp = tempdir().expect("create temp dir");
    let mut transport = SharedFileTransport::new(temp.path().join("board.json"));

    let pulled = transport.pull().await.expect("pull");

    assert_eq!(pulled, None);
}

#[tokio::test]
async fn push_then_pull_round_trips_the_document() {
    let temp = tempdir().expect("create temp dir");
    let path = temp.path().join("board.json");
    let mut transport = SharedFileTransport::new(path.clone());

    transport.push(r#"{"tasks": []}"#).await.expect("push");

    let pulled = transport.pull().await.expect("pull");
    assert_eq!(pulled.as_deref(), Some(r#"{"tasks": []}"#));
    assert!(path.is_file());
}

#[tokio::test]
async fn create_writes_the_file_and_names_it() {
    let temp = tempdir().expect("create temp dir");
    let path = temp.path().join("shared").join("board.json");
    let mut transport = SharedFileTransport::new(path.clone());

    let id = transport.create("{}").await.expect("create");

    assert_eq!(id, path.display().to_string());
    assert!(path.is_file());
}

#[tokio::test]
async fn push_refuses_without_a_write_grant() {
    let temp = tempdir().expect("create temp dir");
    let mut transport = SharedFileTransport {
        path: temp.path().join("board.json"),
        permission: Permission::Denied,
    };

    let err = transport.push("{}").await.expect_err("push should refuse");

    assert!(matches!(err, SyncError::Permission(Permission::Denied)));
    // The gate runs before any IO, so nothing was written.
    assert!(!temp.path().join("board.json").exists());
}

#[tokio::test]
async fn reauthorize_upgrades_the_cached_grant() {
    let temp = tempdir().expect("create temp dir");
    let mut transport = SharedFileTransport {
        path: temp.path().join("board.json"),
        permission: Permission::Denied,
    };
    assert_eq!(transport.permission(), Permission::Denied);

    transport.reauthorize().await.expect("reauthorize");

    assert_eq!(transport.permission(), Permission::Granted);
    transport.push("{}").await.expect("push after reauthorize");
}

#[test]
fn probe_grants_a_writable_directory() {
    let temp = tempdir().expect("create temp dir");
    assert_eq!(probe_dir_write(temp.path()), Permission::Granted);
}

#[test]
fn probe_leaves_no_probe_file_behind() {
    let temp = tempdir().expect("create temp dir");
    probe_dir_write(temp.path());
    let leftovers = std::fs::read_dir(temp.path()).expect("read dir").count();
    assert_eq!(leftovers, 0);
}

#[test]
fn probe_falls_back_to_the_parent_for_a_missing_file() {
    let temp = tempdir().expect("create temp dir");
    let missing = temp.path().join("not-yet-created.json");
    assert_eq!(probe_file_write(&missing), Permission::Granted);
}

#[test]
fn probe_grants_an_existing_writable_file() {
    let temp = tempdir().expect("create temp dir");
    let path = temp.path().join("board.json");
    std::fs::write(&path, "{}").expect("seed file");
    assert_eq!(probe_file_write(&path), Permission::Granted);
}

#[test]
fn probe_is_unknown_for_a_bare_relative_name() {
    assert_eq!(
        probe_file_write(std::path::Path::new("no-parent-to-probe.json")),
        Permission::Unknown
    );
}

#[test]
fn write_atomic_cleans_up_its_temp_file() {
    let temp = tempdir().expect("create temp dir");
    let path = temp.path().join("board.json");

    write_atomic_io(&path, b"{}").expect("write");

    let entries: Vec<_> = std::fs::read_dir(temp.path())
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert_eq!(entries, vec!["board.json"]);
}
