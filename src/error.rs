use thiserror::Error;

use crate::transport::Permission;

/// Failures surfaced by the sync engine and its transports.
///
/// Background loop errors are logged and folded into the connectivity
/// flag; these variants exist so user-initiated actions (join, create,
/// import, backup linking) can report something actionable.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote document not found: {0}")]
    NotFound(String),

    #[error("write permission is {0}; reauthorize to continue")]
    Permission(Permission),

    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("session is read-only; exit the historical view first")]
    ReadOnly,

    #[error("no remote document configured")]
    NoRemote,

    #[error("sync engine is not running")]
    Closed,

    /// Local disk plumbing failed. Carries the full context chain from
    /// the store layer.
    #[error("{0:#}")]
    Storage(anyhow::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Storage(err)
    }
}

impl SyncError {
    /// Whether a bounded retry is worth attempting. Only transient
    /// transport failures qualify; everything else fails the same way
    /// on the next attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}
