use tokio::sync::oneshot;

use crate::backup::BackupTarget;
use crate::error::SyncError;
use crate::model::{BoardState, DocumentPatch, RemoteTarget};
use crate::transport::Transport;

type Reply<T> = oneshot::Sender<T>;

/// Everything a handle can ask of the engine. One channel, processed
/// strictly in order between timer ticks.
pub(super) enum Command {
    Update(DocumentPatch, Reply<Result<(), SyncError>>),
    Import(BoardState, Reply<Result<(), SyncError>>),
    Connect {
        transport: Box<dyn Transport>,
        /// Persisted into settings on success; `None` when the caller
        /// manages settings itself.
        target: Option<RemoteTarget>,
        reply: Reply<Result<(), SyncError>>,
    },
    Disconnect(Reply<()>),
    EnterReadOnly(BoardState, Reply<()>),
    ExitReadOnly(Reply<Result<(), SyncError>>),
    LinkBackup(BackupTarget, Reply<Result<(), SyncError>>),
    Reauthorize(Reply<Result<(), SyncError>>),
    Shutdown(Reply<()>),
}
