use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backup::BackupTarget;
use crate::model::BoardState;
use crate::session::SessionMode;
use crate::store::LocalStore;
use crate::transport::Transport;

mod command;
mod handle;
mod run;
mod status;

pub use self::handle::EngineHandle;
pub use self::status::{ConnectionState, EngineStatus};

use self::command::Command;

/// Loop cadence. The defaults are the production rhythm; tests inject
/// millisecond values through [`SyncEngine::start_with`].
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// How often the remote is polled for changes.
    pub poll_interval: Duration,

    /// Quiet period after the last local mutation before pushing.
    pub push_debounce: Duration,

    /// How long pushes stay muted after a remote change is detected,
    /// so applying a pull cannot echo the same content straight back.
    pub suppression_window: Duration,

    /// How often the backup scheduler re-evaluates.
    pub backup_check_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval: Duration::from_secs(15),
            push_debounce: Duration::from_secs(2),
            suppression_window: Duration::from_millis(500),
            backup_check_interval: Duration::from_secs(3),
        }
    }
}

/// The sync engine: a single task that owns the board, the store, the
/// transport, and every timer. All interaction arrives as commands
/// through an [`EngineHandle`]; observers watch the published board
/// and status channels. Nothing here is shared or locked, so a pull
/// can never interleave halfway through a push.
pub struct SyncEngine {
    config: EngineConfig,
    store: LocalStore,
    state: BoardState,
    mode: SessionMode,
    connection: ConnectionState,
    connected: bool,
    transport: Option<Box<dyn Transport>>,
    backup: Option<BackupTarget>,

    /// Digest of the remote body as last observed.
    last_seen: Option<String>,

    /// Digest of the content we know is on the remote, either because
    /// we pushed it or because a merge produced exactly it.
    last_pushed: Option<String>,

    /// Local changes not yet on the remote.
    dirty: bool,

    push_deadline: Option<Instant>,
    suppress_until: Option<Instant>,
    needs_reauthorization: bool,
    last_error: Option<String>,

    cmd_rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<BoardState>,
    status_tx: watch::Sender<EngineStatus>,
}

impl SyncEngine {
    /// Load the board from the store and start the engine task with
    /// production cadence.
    pub fn start(store: LocalStore) -> Result<(EngineHandle, JoinHandle<()>)> {
        Self::start_with(store, EngineConfig::default())
    }

    pub fn start_with(
        store: LocalStore,
        config: EngineConfig,
    ) -> Result<(EngineHandle, JoinHandle<()>)> {
        let state = store.load_board().context("load board")?;
        let settings = store.load_settings().context("load settings")?;
        let backup = settings.backup.as_ref().map(BackupTarget::from_settings);

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.clone());
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());

        let engine = SyncEngine {
            config,
            store,
            state,
            mode: SessionMode::Live,
            connection: ConnectionState::Disconnected,
            connected: false,
            transport: None,
            backup,
            last_seen: None,
            last_pushed: None,
            dirty: false,
            push_deadline: None,
            suppress_until: None,
            needs_reauthorization: false,
            last_error: None,
            cmd_rx,
            snapshot_tx,
            status_tx,
        };

        let handle = EngineHandle::new(cmd_tx, snapshot_rx, status_rx);
        let task = tokio::spawn(engine.run());
        Ok((handle, task))
    }
}

pub(crate) fn content_digest(body: &str) -> String {
    blake3::hash(body.as_bytes()).to_hex().to_string()
}
