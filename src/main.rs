use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use boardsync::backup::{BackupTarget, today_stamp};
use boardsync::engine::SyncEngine;
use boardsync::error::SyncError;
use boardsync::merge::merge;
use boardsync::model::{BoardState, RemoteTarget};
use boardsync::session::summarize;
use boardsync::store::LocalStore;
use boardsync::transport;

#[derive(Parser)]
#[command(name = "boardsync")]
#[command(about = "Shared board synchronization", long_about = None)]
struct Cli {
    /// Data directory for the local replica
    #[arg(long, value_name = "DIR", default_value = ".boardsync")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new shared document seeded from the local board
    Create {
        /// Blob endpoint base URL
        #[arg(long)]
        url: Option<String>,
        /// Shared file path instead of an HTTP endpoint
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Join an existing shared document and merge it into the local board
    Join {
        /// Blob endpoint base URL
        #[arg(long)]
        url: Option<String>,
        /// Document id on the blob endpoint
        #[arg(long)]
        doc: Option<String>,
        /// Shared file path instead of an HTTP endpoint
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run the sync loop until interrupted
    Run,

    /// Show the local board and sync configuration
    Status {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the board to a JSON file
    Export {
        /// Output path (defaults to board_export_<date>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace the board with a previously exported document
    Import { path: PathBuf },

    /// Link a folder for daily backups
    BackupDir {
        path: PathBuf,
        /// Backup filename prefix
        #[arg(long, default_value = "board_backup")]
        prefix: String,
    },

    /// Inspect a historical snapshot without touching the live board
    Open { path: PathBuf },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardsync=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = LocalStore::open(&cli.data_dir)?;

    match cli.command {
        Commands::Create { url, file } => {
            let target = parse_target(url, None, file)?;
            if let RemoteTarget::Blob {
                doc_id: Some(_), ..
            } = &target
            {
                anyhow::bail!("create assigns the document id; drop --doc");
            }
            let board = store.load_board()?;
            let body = serde_json::to_string(&board).context("serialize board")?;

            let mut transport = transport::from_target(&target)?;
            let id = with_retries("create remote document", async || {
                transport.create(&body).await
            })
            .await?;

            let mut target = target;
            target.set_identifier(id.clone());
            let shared = target.describe();
            save_remote(&store, target)?;

            println!("Created shared document {}", id);
            println!("Sharing target: {}", shared);
            println!("Start syncing with: boardsync run");
        }

        Commands::Join { url, doc, file } => {
            let target = parse_target(url, doc, file)?;
            if let RemoteTarget::Blob { doc_id: None, .. } = &target {
                anyhow::bail!(
                    "join needs --doc <id> (ask whoever created the document, or run `boardsync create`)"
                );
            }
            let mut transport = transport::from_target(&target)?;
            let body = with_retries("pull remote document", async || transport.pull().await)
                .await?
                .with_context(|| {
                    format!(
                        "no document found at {} (check the id, or run `boardsync create` to start one)",
                        target.describe()
                    )
                })?;
            let remote: BoardState =
                serde_json::from_str(&body).context("remote document is not valid JSON")?;

            let local = store.load_board()?;
            let merged = merge(&local, &remote);
            store.save_board(&merged)?;
            let shared = target.describe();
            save_remote(&store, target)?;

            println!("Joined {}", shared);
            println!("Board now holds {} records", merged.record_count());
            println!("Start syncing with: boardsync run");
        }

        Commands::Run => {
            let settings = store.load_settings()?;
            let (handle, task) = SyncEngine::start(store)?;

            match settings.remote {
                Some(target) => {
                    let remote = target.describe();
                    handle
                        .connect(target)
                        .await
                        .with_context(|| format!("connect to {}", remote))?;
                    println!("Syncing with {}", remote);
                }
                None => {
                    println!(
                        "No remote configured; running local-only (use `boardsync create` or `boardsync join` to share)"
                    );
                }
            }
            if settings.backup.is_some() {
                println!("Daily backups enabled");
            }
            println!("Press Ctrl-C to stop");

            tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
            handle.shutdown().await?;
            task.await.context("engine task")?;
        }

        Commands::Status { json } => {
            let settings = store.load_settings()?;
            let board = store.load_board()?;
            let summary = summarize(&board);

            if json {
                let out = serde_json::json!({
                    "data_dir": store.root(),
                    "remote": settings.remote,
                    "backup": settings.backup,
                    "board": summary,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&out).context("serialize status json")?
                );
            } else {
                match &settings.remote {
                    Some(target) => println!("remote: {}", target.describe()),
                    None => println!("remote: none"),
                }
                match &settings.backup {
                    Some(backup) => {
                        println!("backup: {} (prefix {})", backup.dir.display(), backup.prefix)
                    }
                    None => println!("backup: none"),
                }
                print_summary(&summary);
            }
        }

        Commands::Export { out } => {
            let board = store.load_board()?;
            let path =
                out.unwrap_or_else(|| PathBuf::from(format!("board_export_{}.json", today_stamp())));
            store.export_board(&board, &path)?;
            println!("Exported {} records to {}", board.record_count(), path.display());
        }

        Commands::Import { path } => {
            let imported = LocalStore::read_snapshot(&path)
                .with_context(|| format!("import {}", path.display()))?;
            store.save_board(&imported)?;
            println!(
                "Imported {} records from {}",
                imported.record_count(),
                path.display()
            );
        }

        Commands::BackupDir { path, prefix } => {
            let target = BackupTarget::link(path.clone(), prefix)
                .with_context(|| format!("link backup folder {}", path.display()))?;

            let mut settings = store.load_settings()?;
            settings.backup = Some(boardsync::model::BackupSettings {
                dir: target.dir.clone(),
                prefix: target.prefix.clone(),
            });
            store.save_settings(&settings)?;
            println!("Daily backups will be written to {}", target.dir.display());
        }

        Commands::Open { path } => {
            let snapshot = LocalStore::read_snapshot(&path)?;
            let summary = summarize(&snapshot);
            println!("Historical snapshot {} (read-only)", path.display());
            print_summary(&summary);
        }
    }

    Ok(())
}

fn parse_target(
    url: Option<String>,
    doc: Option<String>,
    file: Option<PathBuf>,
) -> Result<RemoteTarget> {
    match (url, file) {
        (Some(url), None) => Ok(RemoteTarget::Blob {
            base_url: url,
            doc_id: doc,
        }),
        (None, Some(path)) => {
            if doc.is_some() {
                anyhow::bail!("--doc only applies to --url remotes");
            }
            Ok(RemoteTarget::SharedFile { path })
        }
        (Some(_), Some(_)) => anyhow::bail!("pass either --url or --file, not both"),
        (None, None) => anyhow::bail!("pass --url <base> or --file <path>"),
    }
}

fn save_remote(store: &LocalStore, target: RemoteTarget) -> Result<()> {
    let mut settings = store.load_settings()?;
    settings.remote = Some(target);
    store.save_settings(&settings)
}

fn print_summary(summary: &boardsync::session::BoardSummary) {
    println!(
        "records: tasks={} projects={} ideas={} kudos={} okrs={} bookings={}",
        summary.tasks,
        summary.projects,
        summary.ideas,
        summary.kudos,
        summary.okrs,
        summary.bookings
    );
    println!("safety log days: {}", summary.safety_days);
    println!("tombstones: {}", summary.deleted);
    match &summary.last_backup_date {
        Some(date) => println!("last backup: {}", date),
        None => println!("last backup: never"),
    }
}

async fn with_retries<T>(
    label: &str,
    mut f: impl AsyncFnMut() -> Result<T, SyncError>,
) -> Result<T> {
    const ATTEMPTS: usize = 3;
    let mut last: Option<anyhow::Error> = None;
    for i in 0..ATTEMPTS {
        match f().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                let retryable = err.is_retryable();
                last = Some(anyhow::Error::new(err));
                if !retryable {
                    break;
                }
                if i + 1 < ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(200 * (1 << i))).await;
                }
            }
        }
    }
    Err(last
        .unwrap_or_else(|| anyhow::anyhow!("unknown error"))
        .context(label.to_string()))
}
