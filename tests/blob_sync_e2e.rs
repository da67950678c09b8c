use std::time::Duration;

use anyhow::{Context, Result};

use boardsync::engine::{EngineConfig, EngineHandle, SyncEngine};
use boardsync::model::{BoardState, DocumentPatch, Record, RemoteTarget};
use boardsync::store::LocalStore;

mod common;

fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(50),
        push_debounce: Duration::from_millis(60),
        suppression_window: Duration::from_millis(150),
        backup_check_interval: Duration::from_millis(500),
    }
}

fn task(id: &str) -> Record {
    Record::from(serde_json::json!({"id": id, "title": format!("task {}", id)}))
}

fn task_ids(state: &BoardState) -> Vec<String> {
    state
        .tasks
        .iter()
        .filter_map(|r| r.id().map(str::to_string))
        .collect()
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        if cond() {
            return Ok(());
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn start_replica(temp: &tempfile::TempDir) -> Result<(LocalStore, EngineHandle)> {
    let store = LocalStore::open(&temp.path().join(".boardsync")).context("open store")?;
    let (handle, _task) = SyncEngine::start_with(store.clone(), fast_config())?;
    Ok((store, handle))
}

#[test]
fn two_replicas_converge_through_the_blob_server() -> Result<()> {
    // Spawned before the runtime exists: the health check uses the
    // blocking client.
    let server = common::spawn_server()?;

    let runtime = tokio::runtime::Runtime::new().context("build runtime")?;
    runtime.block_on(async {
        let dir_a = tempfile::tempdir().context("tempdir a")?;
        let dir_b = tempfile::tempdir().context("tempdir b")?;
        let (store_a, a) = start_replica(&dir_a)?;
        let (_store_b, b) = start_replica(&dir_b)?;

        // Replica A creates the shared document.
        a.connect(RemoteTarget::Blob {
            base_url: server.docs_url(),
            doc_id: None,
        })
        .await
        .context("connect a")?;

        // The assigned id was persisted into A's settings; B joins it.
        let settings = store_a.load_settings().context("load a settings")?;
        let Some(RemoteTarget::Blob {
            doc_id: Some(doc_id),
            ..
        }) = settings.remote
        else {
            anyhow::bail!("replica a did not persist the assigned document id");
        };

        b.connect(RemoteTarget::Blob {
            base_url: server.docs_url(),
            doc_id: Some(doc_id),
        })
        .await
        .context("connect b")?;

        // Concurrent edits on both replicas.
        a.update(DocumentPatch {
            tasks: Some(vec![task("from-a")]),
            ..DocumentPatch::default()
        })
        .await
        .context("update a")?;
        b.update(DocumentPatch {
            tasks: Some(vec![task("from-b")]),
            ..DocumentPatch::default()
        })
        .await
        .context("update b")?;

        wait_until("replicas to converge", || {
            let ids_a = task_ids(&a.snapshot());
            let ids_b = task_ids(&b.snapshot());
            ids_a.contains(&"from-a".to_string())
                && ids_a.contains(&"from-b".to_string())
                && ids_a == ids_b
        })
        .await?;

        // A deletes B's record; the tombstone must reach B and win
        // over B's still-present copy.
        let remaining: Vec<Record> = a
            .snapshot()
            .tasks
            .iter()
            .filter(|r| r.id() != Some("from-b"))
            .cloned()
            .collect();
        a.update(DocumentPatch {
            tasks: Some(remaining),
            ..DocumentPatch::default()
        })
        .await
        .context("delete on a")?;

        wait_until("deletion to propagate", || {
            let state_b = b.snapshot();
            !task_ids(&state_b).contains(&"from-b".to_string())
                && state_b.deleted_item_ids.contains("from-b")
        })
        .await?;

        // Both settle clean; the record never resurfaces on A either.
        wait_until("both replicas clean", || {
            !a.status().dirty && !b.status().dirty
        })
        .await?;
        assert!(!task_ids(&a.snapshot()).contains(&"from-b".to_string()));

        a.shutdown().await.context("shutdown a")?;
        b.shutdown().await.context("shutdown b")?;
        Ok(())
    })
}

#[test]
fn a_late_joiner_adopts_the_full_document() -> Result<()> {
    let server = common::spawn_server()?;

    let runtime = tokio::runtime::Runtime::new().context("build runtime")?;
    runtime.block_on(async {
        let dir_a = tempfile::tempdir().context("tempdir a")?;
        let (store_a, a) = start_replica(&dir_a)?;

        a.connect(RemoteTarget::Blob {
            base_url: server.docs_url(),
            doc_id: None,
        })
        .await
        .context("connect a")?;

        a.update(DocumentPatch {
            tasks: Some(vec![task("t1"), task("t2")]),
            ..DocumentPatch::default()
        })
        .await
        .context("update a")?;
        wait_until("a settles", || !a.status().dirty).await?;

        let settings = store_a.load_settings().context("load a settings")?;
        let Some(target) = settings.remote else {
            anyhow::bail!("replica a did not persist its remote");
        };

        // A fresh replica connects afterwards and sees everything.
        let dir_b = tempfile::tempdir().context("tempdir b")?;
        let (_store_b, b) = start_replica(&dir_b)?;
        b.connect(target).await.context("connect b")?;

        let ids = task_ids(&b.snapshot());
        assert!(ids.contains(&"t1".to_string()));
        assert!(ids.contains(&"t2".to_string()));

        a.shutdown().await.context("shutdown a")?;
        b.shutdown().await.context("shutdown b")?;
        Ok(())
    })
}
