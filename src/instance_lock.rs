//! Single instance lock using a Unix socket.
//!
//! Only one monitor may drive the relay and the sensor at a time. The lock is
//! a bound Unix socket: the OS releases it when the process dies, so a crash
//! never leaves a lock that blocks the next start.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOCKET_NAME: &str = "bed-monitor.lock";

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another bed-monitor instance is already running")]
    AlreadyRunning,

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for the lifetime of the process; the socket file is removed on drop.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at the default location.
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(default_path(std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from)))
    }

    pub fn acquire_at(path: impl AsRef<Path>) -> Result<Self, InstanceLockError> {
        let path = path.as_ref().to_path_buf();

        // A socket file nobody answers on was left by a killed process.
        if path.exists() {
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning);
            }
            let _ = std::fs::remove_file(&path);
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(InstanceLockError::AlreadyRunning),
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lock path inside `runtime_dir`, falling back to `/tmp`.
pub fn default_path(runtime_dir: Option<PathBuf>) -> PathBuf {
    runtime_dir
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_NAME)
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
