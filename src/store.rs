use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::{BoardState, SyncSettings};

const BOARD_FILE: &str = "board.json";
const SETTINGS_FILE: &str = "settings.json";
const BACKUP_DIR: &str = "backups";

/// On-disk home of one replica: the cached board document plus the
/// sync settings describing where the shared copy lives.
///
/// All writes go through a temp-file-and-rename so a crash mid-write
/// never leaves a truncated document behind.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a data directory, creating and seeding it on first use.
    /// A fresh directory gets a default board and empty settings, so
    /// every command works without a separate init step.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("create data dir {}", root.display()))?;

        let store = Self {
            root: root.to_path_buf(),
        };

        let board = serde_json::to_vec_pretty(&BoardState::default())
            .context("serialize default board")?;
        write_if_absent(&store.board_path(), &board).context("seed board.json")?;

        let settings = serde_json::to_vec_pretty(&SyncSettings::default())
            .context("serialize default settings")?;
        write_if_absent(&store.settings_path(), &settings).context("seed settings.json")?;

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn board_path(&self) -> PathBuf {
        self.root.join(BOARD_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Default destination for daily backups when the user has not
    /// linked an external folder.
    pub fn default_backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    pub fn load_board(&self) -> Result<BoardState> {
        let path = self.board_path();
        if !path.exists() {
            return Ok(BoardState::default());
        }
        let bytes = fs::read(&path).context("read board.json")?;
        let state: BoardState = serde_json::from_slice(&bytes).context("parse board.json")?;
        Ok(state)
    }

    pub fn save_board(&self, state: &BoardState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).context("serialize board")?;
        write_atomic(&self.board_path(), &bytes).context("write board.json")?;
        Ok(())
    }

    pub fn load_settings(&self) -> Result<SyncSettings> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(SyncSettings::default());
        }
        let bytes = fs::read(&path).context("read settings.json")?;
        let settings: SyncSettings =
            serde_json::from_slice(&bytes).context("parse settings.json")?;
        if settings.version != 1 {
            anyhow::bail!("unsupported settings version {}", settings.version);
        }
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(settings).context("serialize settings")?;
        write_atomic(&self.settings_path(), &bytes).context("write settings.json")?;
        Ok(())
    }

    /// Write the board to an arbitrary path, pretty-printed. Used by
    /// export and by the backup scheduler.
    pub fn export_board(&self, state: &BoardState, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).context("serialize board")?;
        write_atomic(path, &bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Read a board document from an arbitrary path. Used by import
    /// and by the historical (read-only) viewer.
    pub fn read_snapshot(path: &Path) -> Result<BoardState> {
        let bytes =
            fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let state: BoardState = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(state)
    }
}

fn write_if_absent(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    write_atomic(path, bytes)
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create parent directories")?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes).with_context(|| format!("write temp file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
