//! Development blob server: the dumbest remote that satisfies the sync
//! loop. Documents are opaque JSON files under the data dir; writes
//! are last-writer-wins byte-for-byte, and all merging happens in the
//! clients. No auth, not for production.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "boardsync-server")]
#[command(about = "Board document blob store (development)", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Write bound address to this file (dev/test convenience)
    #[arg(long)]
    addr_file: Option<PathBuf>,

    /// Data directory
    #[arg(long, default_value = "./boardsync-docs")]
    data_dir: PathBuf,
}

#[derive(Clone)]
struct AppState {
    data_dir: PathBuf,

    /// Known document ids. Doubles as the existence check so `PUT` on
    /// an unknown id is a clean 404 instead of an upsert.
    docs: Arc<RwLock<HashSet<String>>>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("create data dir {}", args.data_dir.display()))?;

    // Re-index existing documents so the dev server survives restarts.
    let docs = load_doc_index(&args.data_dir).context("index existing documents")?;

    let state = Arc::new(AppState {
        data_dir: args.data_dir.clone(),
        docs: Arc::new(RwLock::new(docs)),
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/docs", post(create_doc))
        .route("/docs/:doc_id", get(get_doc).put(put_doc))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;

    let local_addr = listener.local_addr().context("read listener local addr")?;
    eprintln!("boardsync-server listening on {}", local_addr);

    if let Some(addr_file) = &args.addr_file {
        std::fs::write(addr_file, local_addr.to_string())
            .with_context(|| format!("write addr file {}", addr_file.display()))?;
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn load_doc_index(data_dir: &std::path::Path) -> Result<HashSet<String>> {
    let mut docs = HashSet::new();
    for entry in std::fs::read_dir(data_dir).context("read data dir")? {
        let entry = entry.context("read data dir entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(id) = name.strip_suffix(".json")
            && validate_doc_id(id).is_ok()
        {
            docs.insert(id.to_string());
        }
    }
    Ok(docs)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn create_doc(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Response, Response> {
    require_json(&body)?;

    let id = new_doc_id().map_err(internal_error)?;
    let path = doc_path(&state, &id);
    write_atomic(&path, &body).map_err(internal_error)?;
    state.docs.write().await.insert(id.clone());

    let uri = format!("/docs/{}", id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, uri.clone())],
        Json(serde_json::json!({"id": id, "uri": uri})),
    )
        .into_response())
}

async fn get_doc(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<Response, Response> {
    validate_doc_id(&doc_id).map_err(bad_request)?;

    if !state.docs.read().await.contains(&doc_id) {
        return Err(not_found());
    }
    let path = doc_path(&state, &doc_id);
    let bytes = std::fs::read(&path)
        .with_context(|| format!("read {}", path.display()))
        .map_err(internal_error)?;
    Ok(json_bytes(bytes))
}

async fn put_doc(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
    body: axum::body::Bytes,
) -> Result<StatusCode, Response> {
    validate_doc_id(&doc_id).map_err(bad_request)?;
    require_json(&body)?;

    // Hold the write lock across the file write so concurrent PUTs to
    // one id cannot interleave their temp files.
    let docs = state.docs.write().await;
    if !docs.contains(&doc_id) {
        return Err(not_found());
    }
    let path = doc_path(&state, &doc_id);
    write_atomic(&path, &body).map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn require_json(body: &[u8]) -> Result<(), Response> {
    serde_json::from_slice::<serde_json::Value>(body)
        .map(|_| ())
        .map_err(|e| bad_request(anyhow::anyhow!("body is not valid JSON: {}", e)))
}

fn doc_path(state: &AppState, doc_id: &str) -> PathBuf {
    state.data_dir.join(format!("{}.json", doc_id))
}

fn validate_doc_id(id: &str) -> Result<()> {
    if id.len() != 32 {
        return Err(anyhow::anyhow!("document id must be 32 hex chars"));
    }
    if !id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        return Err(anyhow::anyhow!("document id must be lowercase hex"));
    }
    Ok(())
}

fn new_doc_id() -> Result<String> {
    // 16 bytes of entropy, hex-encoded.
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("getrandom: {:?}", e))?;
    let mut out = String::with_capacity(32);
    for b in &bytes {
        out.push_str(&format!("{:02x}", b));
    }
    Ok(out)
}

fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    std::fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

fn json_bytes(bytes: Vec<u8>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        axum::body::Bytes::from(bytes),
    )
        .into_response()
}

fn bad_request(err: anyhow::Error) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": err.to_string()})),
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not found"})),
    )
        .into_response()
}

fn internal_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": err.to_string()})),
    )
        .into_response()
}
