use tokio::sync::{mpsc, oneshot, watch};

use crate::backup::BackupTarget;
use crate::error::SyncError;
use crate::model::{BoardState, DocumentPatch, RemoteTarget};
use crate::transport::{self, Transport};

use super::command::Command;
use super::status::EngineStatus;

/// Cloneable front door to a running engine. Every method is a
/// round-trip through the engine's command channel, so callers observe
/// their own effects: once `update` returns, the board snapshot
/// already reflects the patch.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<BoardState>,
    status_rx: watch::Receiver<EngineStatus>,
}

impl EngineHandle {
    pub(super) fn new(
        cmd_tx: mpsc::Sender<Command>,
        snapshot_rx: watch::Receiver<BoardState>,
        status_rx: watch::Receiver<EngineStatus>,
    ) -> Self {
        Self {
            cmd_tx,
            snapshot_rx,
            status_rx,
        }
    }

    async fn send<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SyncError::Closed)?;
        reply_rx.await.map_err(|_| SyncError::Closed)
    }

    /// Apply a partial board mutation. Rejected in read-only mode.
    pub async fn update(&self, patch: DocumentPatch) -> Result<(), SyncError> {
        self.send(|reply| Command::Update(patch, reply)).await?
    }

    /// Replace the whole board with an imported document and return to
    /// live mode if a historical session was active.
    pub async fn import(&self, state: BoardState) -> Result<(), SyncError> {
        self.send(|reply| Command::Import(state, reply)).await?
    }

    /// Attach the remote described by `target`: adopt the remote
    /// document if it exists, create it from local state otherwise.
    /// Persists the target (with any newly assigned document id) into
    /// settings on success.
    pub async fn connect(&self, target: RemoteTarget) -> Result<(), SyncError> {
        let transport = transport::from_target(&target)?;
        self.send(|reply| Command::Connect {
            transport,
            target: Some(target),
            reply,
        })
        .await?
    }

    /// Attach an already built transport without touching settings.
    pub async fn connect_with(&self, transport: Box<dyn Transport>) -> Result<(), SyncError> {
        self.send(|reply| Command::Connect {
            transport,
            target: None,
            reply,
        })
        .await?
    }

    /// Drop the transport and stop both sync timers. Local edits keep
    /// working and keep accumulating as unpushed changes.
    pub async fn disconnect(&self) -> Result<(), SyncError> {
        self.send(Command::Disconnect).await
    }

    /// Swap the published board for a historical snapshot. Mutations,
    /// sync, and backups are disabled until [`exit_read_only`].
    ///
    /// [`exit_read_only`]: EngineHandle::exit_read_only
    pub async fn enter_read_only(&self, snapshot: BoardState) -> Result<(), SyncError> {
        self.send(|reply| Command::EnterReadOnly(snapshot, reply))
            .await
    }

    /// Reload the live board and return to live mode, still
    /// disconnected; reconnecting is a separate explicit step.
    pub async fn exit_read_only(&self) -> Result<(), SyncError> {
        self.send(Command::ExitReadOnly).await?
    }

    /// Attach a backup folder (already probed via
    /// [`BackupTarget::link`]) and persist it into settings.
    pub async fn link_backup(&self, target: BackupTarget) -> Result<(), SyncError> {
        self.send(|reply| Command::LinkBackup(target, reply)).await?
    }

    /// Re-probe every revocable grant the engine holds. The only path
    /// that clears `needs_reauthorization`.
    pub async fn reauthorize(&self) -> Result<(), SyncError> {
        self.send(Command::Reauthorize).await?
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Command::Shutdown).await
    }

    /// Current board as last published by the engine.
    pub fn snapshot(&self) -> BoardState {
        self.snapshot_rx.borrow().clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<BoardState> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }
}
