use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use time::format_description::FormatItem;

use crate::error::SyncError;
use crate::model::{BackupSettings, BoardState};
use crate::transport::Permission;
use crate::transport::shared_file::{probe_dir_write, write_atomic_io};

/// A linked backup folder. The engine snapshots the board here at most
/// once per calendar day; `last_backup_date` on the board itself is
/// the idempotence marker, so restarts within the same day stay
/// no-ops.
///
/// Like the shared-file transport, write access is a cached grant that
/// only degrades on its own and only upgrades through an explicit
/// reauthorization.
pub struct BackupTarget {
    pub dir: PathBuf,
    pub prefix: String,
    pub(crate) permission: Permission,
}

/// What the scheduler should do on this tick.
#[derive(Debug, PartialEq, Eq)]
pub enum BackupPlan {
    /// A backup for today already exists.
    AlreadyDone,
    /// Write access is gone; flag it and wait for the user.
    NeedsReauthorization,
    Write { path: PathBuf },
}

impl BackupTarget {
    /// Link a backup folder as a user gesture: create it if needed,
    /// probe it, and fail loudly when it is not writable.
    pub fn link(dir: PathBuf, prefix: String) -> Result<Self, SyncError> {
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(SyncError::Permission(Permission::Denied));
            }
            Err(err) => return Err(SyncError::Io(err)),
        }
        let permission = probe_dir_write(&dir);
        if permission != Permission::Granted {
            return Err(SyncError::Permission(permission));
        }
        Ok(Self {
            dir,
            prefix,
            permission,
        })
    }

    /// Rebuild a target from persisted settings at startup. Does not
    /// fail on a degraded grant; the scheduler will flag it instead.
    pub fn from_settings(settings: &BackupSettings) -> Self {
        let permission = probe_dir_write(&settings.dir);
        Self {
            dir: settings.dir.clone(),
            prefix: settings.prefix.clone(),
            permission,
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn reauthorize(&mut self) -> Result<(), SyncError> {
        self.permission = probe_dir_write(&self.dir);
        if self.permission != Permission::Granted {
            return Err(SyncError::Permission(self.permission));
        }
        Ok(())
    }

    /// Decide this tick's action. Pure: consults only the cached
    /// permission and the board's backup date.
    pub fn plan(&self, last_backup_date: Option<&str>, today: &str) -> BackupPlan {
        if last_backup_date == Some(today) {
            return BackupPlan::AlreadyDone;
        }
        if self.permission != Permission::Granted {
            return BackupPlan::NeedsReauthorization;
        }
        BackupPlan::Write {
            path: self.dir.join(backup_file_name(&self.prefix, today)),
        }
    }

    /// Write one snapshot, degrading the cached grant if the OS turns
    /// the write down.
    pub fn write_snapshot(&mut self, state: &BoardState, path: &Path) -> Result<(), SyncError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        match write_atomic_io(path, &bytes) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.permission = Permission::Denied;
                Err(SyncError::Permission(Permission::Denied))
            }
            Err(err) => Err(SyncError::Io(err)),
        }
    }
}

pub fn backup_file_name(prefix: &str, date: &str) -> String {
    format!("{}_{}.json", prefix, date)
}

fn date_stamp_format() -> &'static [FormatItem<'static>] {
    static FMT: OnceLock<Vec<FormatItem<'static>>> = OnceLock::new();
    FMT.get_or_init(|| {
        time::format_description::parse("[year]-[month padding:zero]-[day padding:zero]")
            .expect("valid time format")
    })
}

/// Today as `YYYY-MM-DD` in UTC, the granularity the once-per-day rule
/// works at.
pub fn today_stamp() -> String {
    time::OffsetDateTime::now_utc()
        .date()
        .format(date_stamp_format())
        .unwrap_or_else(|_| "0000-00-00".to_string())
}

#[cfg(test)]
#[path = "tests/backup_tests.rs"]
mod tests;
