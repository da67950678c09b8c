use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::SyncError;

use super::{Permission, Transport};

/// Remote document as one JSON file in a shared location (network
/// mount, synced folder). Unlike the HTTP transport, the write grant
/// here is revocable out from under us, so the current permission is
/// cached and re-checked before every write.
///
/// The cache only ever degrades on its own: a denied OS write flips it
/// to `Denied`, and nothing short of an explicit [`reauthorize`]
/// upgrades it back.
///
/// [`reauthorize`]: Transport::reauthorize
pub struct SharedFileTransport {
    path: PathBuf,
    permission: Permission,
}

impl SharedFileTransport {
    /// Construction happens inside a user gesture (linking the file),
    /// so the write probe runs once here; afterwards only explicit
    /// reauthorization probes again.
    pub fn new(path: PathBuf) -> Self {
        let permission = probe_file_write(&path);
        Self { path, permission }
    }

    fn require_write(&self) -> Result<(), SyncError> {
        if self.permission != Permission::Granted {
            return Err(SyncError::Permission(self.permission));
        }
        Ok(())
    }

    fn write_document(&mut self, body: &str) -> Result<(), SyncError> {
        self.require_write()?;
        match write_atomic_io(&self.path, body.as_bytes()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.permission = Permission::Denied;
                Err(SyncError::Permission(Permission::Denied))
            }
            Err(err) => Err(SyncError::Io(err)),
        }
    }
}

#[async_trait]
impl Transport for SharedFileTransport {
    async fn pull(&mut self) -> Result<Option<String>, SyncError> {
        match fs::read_to_string(&self.path) {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                self.permission = Permission::Denied;
                Err(SyncError::Permission(Permission::Denied))
            }
            Err(err) => Err(SyncError::Io(err)),
        }
    }

    async fn push(&mut self, body: &str) -> Result<(), SyncError> {
        self.write_document(body)
    }

    async fn create(&mut self, body: &str) -> Result<String, SyncError> {
        self.write_document(body)?;
        Ok(self.path.display().to_string())
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    async fn reauthorize(&mut self) -> Result<(), SyncError> {
        self.permission = probe_file_write(&self.path);
        if self.permission != Permission::Granted {
            return Err(SyncError::Permission(self.permission));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Probe write access to a file without modifying it. A missing file
/// falls back to probing its parent directory, since creating the
/// file is exactly what the first push will do.
pub(crate) fn probe_file_write(path: &Path) -> Permission {
    if path.exists() {
        match fs::OpenOptions::new().write(true).open(path) {
            Ok(_) => Permission::Granted,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => Permission::Denied,
            Err(_) => Permission::Unknown,
        }
    } else {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => probe_dir_write(parent),
            _ => Permission::Unknown,
        }
    }
}

/// Probe write access to a directory by creating and removing a
/// throwaway file.
pub(crate) fn probe_dir_write(dir: &Path) -> Permission {
    let probe = dir.join(format!(".boardsync-probe.{}", std::process::id()));
    match fs::write(&probe, b"") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            Permission::Granted
        }
        Err(err) if err.kind() == ErrorKind::PermissionDenied => Permission::Denied,
        Err(_) => Permission::Unknown,
    }
}

pub(crate) fn write_atomic_io(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "../tests/transport/shared_file_tests.rs"]
mod tests;
