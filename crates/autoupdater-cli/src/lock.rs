//! # Single-Instance Lock
//!
//! At most one autoupdater may run on a device at a time. The guard takes a
//! non-blocking exclusive `flock` on a well-known file and holds it until
//! dropped. Contention is reported immediately; there is no waiting or
//! retry.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg, OFlag};
use thiserror::Error;

/// Lock acquisition errors.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock file could not be opened or created.
    #[error("unable to open lock file {}: {}", .path.display(), .source)]
    Open {
        /// Lock file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the lock.
    #[error("another instance is currently running")]
    AlreadyRunning,

    /// `flock` failed for a reason other than contention.
    #[error("unable to lock {}: {}", .path.display(), .source)]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Error reported by `flock`.
        #[source]
        source: Errno,
    },
}

/// Exclusive lock held for the lifetime of the value.
pub struct InstanceLock {
    _flock: Flock<File>,
    path: PathBuf,
}

impl InstanceLock {
    /// Open (creating if needed, mode 0666 before umask) and lock `path`.
    ///
    /// # Errors
    ///
    /// [`LockError::AlreadyRunning`] if another open file description holds
    /// the lock, [`LockError::Open`] or [`LockError::Lock`] otherwise.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_CREAT.bits())
            .mode(0o666)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => {
                tracing::debug!(path = %path.display(), "acquired instance lock");
                Ok(Self {
                    _flock: flock,
                    path: path.to_path_buf(),
                })
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(LockError::AlreadyRunning),
            Err((_, errno)) => Err(LockError::Lock {
                path: path.to_path_buf(),
                source: errno,
            }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLock").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_reports_contention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoupdater.lock");

        let held = InstanceLock::acquire(&path).unwrap();
        assert_eq!(held.path(), path);
        assert!(path.exists());

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::AlreadyRunning));
        assert_eq!(err.to_string(), "another instance is currently running");
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoupdater.lock");

        drop(InstanceLock::acquire(&path).unwrap());
        assert!(InstanceLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_unopenable_path_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("autoupdater.lock");

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::Open { .. }));
    }
}
