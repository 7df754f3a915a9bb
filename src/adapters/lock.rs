//! Single-instance PID lock
//!
//! The lock file holds the owning process id. A file naming a dead process
//! (or holding garbage) is stale and gets taken over.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DEFAULT_LOCK_PATH: &str = "quotewatch.lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Another monitor is already running (pid {pid}); remove {path} if it is stale")]
    AlreadyRunning { pid: u32, path: String },

    #[error("Lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Held for the lifetime of the monitor; the file is removed on drop
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let pid = std::process::id();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // A second attempt follows a stale takeover; losing that race to
        // another process means its pid is now in the file.
        for _ in 0..2 {
            if create_exclusive(&path, pid)? {
                tracing::debug!("Acquired instance lock {}", path.display());
                return Ok(Self { path, pid });
            }

            match read_holder(&path)? {
                Some(holder) if holder == pid => {
                    fs::write(&path, pid.to_string())?;
                    return Ok(Self { path, pid });
                }
                Some(holder) if process_alive(holder) => {
                    return Err(LockError::AlreadyRunning {
                        pid: holder,
                        path: path.display().to_string(),
                    });
                }
                Some(holder) => {
                    tracing::warn!("Taking over stale lock {} (pid {})", path.display(), holder);
                    remove_if_present(&path)?;
                }
                None => {}
            }
        }

        let holder = read_holder(&path)?.unwrap_or(0);
        Err(LockError::AlreadyRunning {
            pid: holder,
            path: path.display().to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Only remove the file if it is still ours
        if let Ok(Some(holder)) = read_holder(&self.path) {
            if holder != self.pid {
                return;
            }
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove lock {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Create the lock file only if absent. `Ok(false)` when it already exists.
fn create_exclusive(path: &Path, pid: u32) -> Result<bool, LockError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            write!(file, "{}", pid)?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Pid recorded in the lock file. Unreadable content counts as stale (`Some(0)`).
fn read_holder(path: &Path) -> Result<Option<u32>, LockError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().parse().unwrap_or(0))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    pid != 0 && Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(pid: u32) -> bool {
    pid != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_pid_and_drop_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.lock");

        {
            let lock = InstanceLock::acquire(&path).unwrap();
            let content = fs::read_to_string(&path).unwrap();
            assert_eq!(content, std::process::id().to_string());
            assert_eq!(lock.pid(), std::process::id());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_garbage_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.lock");
        fs::write(&path, "not-a-pid").unwrap();

        let lock = InstanceLock::acquire(&path);
        assert!(lock.is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dead_pid_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.lock");
        fs::write(&path, u32::MAX.to_string()).unwrap();

        assert!(InstanceLock::acquire(&path).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_live_pid_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.lock");
        // pid 1 always exists
        fs::write(&path, "1").unwrap();

        let result = InstanceLock::acquire(&path);
        assert!(matches!(result, Err(LockError::AlreadyRunning { pid: 1, .. })));
        assert!(path.exists());
    }

    #[test]
    fn test_exclusive_create_leaves_existing_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.lock");

        assert!(create_exclusive(&path, 42).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");

        // a concurrent starter that lost the race must not overwrite
        assert!(!create_exclusive(&path, 43).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_rewritten_with_own_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("monitor.lock");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, u32::MAX.to_string()).unwrap();

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), std::process::id().to_string());
    }
}
