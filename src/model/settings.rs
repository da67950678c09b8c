use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Contents of `settings.json` in the data directory. The board
/// document itself lives in `board.json`; settings only describe how
/// this replica reaches the shared copy and where backups go.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncSettings {
    pub version: u32,

    #[serde(default)]
    pub remote: Option<RemoteTarget>,

    #[serde(default)]
    pub backup: Option<BackupSettings>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            version: 1,
            remote: None,
            backup: None,
        }
    }
}

/// Where the shared document lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteTarget {
    /// A dumb JSON-blob HTTP endpoint: `POST {base_url}` creates a
    /// document, `GET`/`PUT {base_url}/{doc_id}` read and replace it.
    Blob {
        base_url: String,

        /// Unset until the document is created on first connect.
        #[serde(default)]
        doc_id: Option<String>,
    },

    /// One JSON file in a location shared out of band (network mount,
    /// synced folder). Write access can be revoked underneath us.
    SharedFile { path: PathBuf },
}

impl RemoteTarget {
    /// Record the identifier assigned when the remote document was
    /// created. A no-op for file targets, whose path is fixed.
    pub fn set_identifier(&mut self, id: String) {
        if let RemoteTarget::Blob { doc_id, .. } = self {
            *doc_id = Some(id);
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RemoteTarget::Blob { base_url, doc_id } => match doc_id {
                Some(id) => format!("{}/{}", base_url.trim_end_matches('/'), id),
                None => format!("{} (document not created yet)", base_url),
            },
            RemoteTarget::SharedFile { path } => path.display().to_string(),
        }
    }
}

/// Backup destination: a local directory this replica snapshots the
/// board into, at most once per calendar day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    pub dir: PathBuf,

    #[serde(default = "default_backup_prefix")]
    pub prefix: String,
}

pub(crate) fn default_backup_prefix() -> String {
    "board_backup".to_string()
}
