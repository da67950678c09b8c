use std::fmt;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::RemoteTarget;

mod blob;
pub(crate) mod shared_file;

pub use self::blob::BlobTransport;
pub use self::shared_file::SharedFileTransport;

/// How far this replica is allowed to write to its remote. HTTP
/// targets are always writable; file targets sit behind a revocable
/// OS grant that can disappear between writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Never probed, or the last probe failed for a reason other than
    /// an outright denial.
    Unknown,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A remote replica of the board document, reduced to the narrowest
/// possible surface: read the whole thing, replace the whole thing,
/// create it when it does not exist. No partial reads, no conditional
/// writes, no server-side merge. Everything clever lives above this
/// trait.
#[async_trait]
pub trait Transport: Send {
    /// Fetch the current remote document body. `Ok(None)` means the
    /// document does not exist yet, which is a valid state to act on
    /// by creating, not an error.
    async fn pull(&mut self) -> Result<Option<String>, SyncError>;

    /// Replace the remote document wholesale.
    async fn push(&mut self, body: &str) -> Result<(), SyncError>;

    /// Create the remote document and return its identifier (a blob
    /// document id, or the shared file path).
    async fn create(&mut self, body: &str) -> Result<String, SyncError>;

    /// Cached write-permission state. Never performs IO.
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    /// Explicitly re-probe write access. The only path that upgrades
    /// a degraded permission; the engine never escalates on its own.
    async fn reauthorize(&mut self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Human-readable target, for logs and status output.
    fn describe(&self) -> String;
}

/// Build the transport a settings entry points at.
pub fn from_target(target: &RemoteTarget) -> Result<Box<dyn Transport>, SyncError> {
    match target {
        RemoteTarget::Blob { base_url, doc_id } => Ok(Box::new(BlobTransport::new(
            base_url.clone(),
            doc_id.clone(),
        )?)),
        RemoteTarget::SharedFile { path } => {
            Ok(Box::new(SharedFileTransport::new(path.clone())))
        }
    }
}
