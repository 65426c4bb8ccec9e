//! Process-wide run lock.
//!
//! A run holds an exclusive, non-blocking `flock(2)` on the lock file for its
//! whole duration.  A second run fails immediately instead of queueing behind
//! the first.  The kernel drops the lock when the guard's file is closed or
//! the process exits, so there is nothing to clean up after a crash.

use std::{
    fs::{File, OpenOptions},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};
use tracing::debug;

use crate::error::BackupError;

/// Held lock; released on drop.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    _flock: Flock<File>,
}

impl ProcessLock {
    /// Open (creating if needed) `path` and take the lock without waiting.
    ///
    /// Only `EINTR` is retried.  Anything else, "already locked" included, is
    /// returned as [`BackupError::LockHeld`].
    pub fn acquire(path: &Path) -> Result<Self, BackupError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)
            .map_err(|source| BackupError::LockOpen {
                path: path.to_path_buf(),
                source,
            })?;

        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(flock) => {
                    debug!(path = %path.display(), "lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        _flock: flock,
                    });
                },
                Err((returned, Errno::EINTR)) => file = returned,
                Err((_, source)) => {
                    return Err(BackupError::LockHeld {
                        path: path.to_path_buf(),
                        source,
                    });
                },
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
