use std::fmt;

use crate::session::SessionMode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport configured or an explicit disconnect happened.
    #[default]
    Disconnected,
    /// First contact (pull-or-create) in progress.
    Connecting,
    /// A transport is attached; the loop is polling and pushing.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Point-in-time engine health, published on a watch channel whenever
/// something changes.
///
/// `connection` says whether a transport is attached; `connected` says
/// whether the last background operation against it succeeded. The
/// pair diverges exactly when the remote is configured but currently
/// unreachable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub connection: ConnectionState,
    pub connected: bool,
    pub mode: SessionMode,

    /// A revocable grant (backup folder or shared file) was lost and
    /// needs an explicit reauthorization.
    pub needs_reauthorization: bool,

    /// Local changes not yet acknowledged by the remote.
    pub dirty: bool,

    pub last_error: Option<String>,
}
