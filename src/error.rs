//! Error types for the backup core.
//!
//! Two layers:
//!
//! - [`ExecError`] describes a failed external tool invocation (`tmutil`,
//!   `mount`).  It never says *why* the tool was being run.
//! - [`BackupError`] is what the pipeline returns.  Every variant names the
//!   stage that failed and keeps the underlying cause as its `source`, so the
//!   full chain can be printed by the caller.
//!
//! Callers that need to branch on the failure class use [`BackupError::kind`]
//! instead of matching on individual variants.

use std::{fmt, io, path::PathBuf, process::ExitStatus};

use nix::errno::Errno;
use thiserror::Error;

// ─── Tool invocation ──────────────────────────────────────────────────────────

/// A command run through [`crate::exec::CommandRunner`] did not succeed.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("cannot run an empty command")]
    Empty,

    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited non-zero ({status}){}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        status: ExitStatus,
        /// Trimmed stderr of the failed command, possibly empty.
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// Failure class of a [`BackupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Another run holds the lock, or the lock file is unusable.
    Lock,
    /// Creating, listing or deleting local snapshots failed.
    Snapshot,
    /// A snapshot identifier did not have the `prefix.date.time.uid` shape.
    MalformedIdentifier,
    /// The snapshot could not be mounted.
    Mount,
    /// The hostname needed for the archive name could not be read.
    Host,
    /// borg could not be started or exited non-zero on its own.
    Archive,
    /// The mountpoint is still mounted; an operator has to clean up.
    Unmount,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Snapshot => "snapshot",
            Self::MalformedIdentifier => "malformed-identifier",
            Self::Mount => "mount",
            Self::Host => "host",
            Self::Archive => "archive",
            Self::Unmount => "unmount",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("error while opening lockfile {}", .path.display())]
    LockOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "error while acquiring file lock {} (maybe another process running?)",
        .path.display()
    )]
    LockHeld {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("error while creating snapshot")]
    SnapshotCreate {
        #[source]
        source: ExecError,
    },

    #[error("error while getting latest snapshot")]
    SnapshotList {
        #[source]
        source: ExecError,
    },

    #[error("no available snapshots")]
    NoSnapshots,

    #[error("error while removing snapshot {identifier}")]
    SnapshotDelete {
        identifier: String,
        #[source]
        source: ExecError,
    },

    #[error("unrecognized snapshot format: {identifier:?}")]
    MalformedIdentifier { identifier: String },

    #[error("error while preparing mountpoint {}", .path.display())]
    Mountpoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error while mounting snapshot {snapshot} at {}", .mountpoint.display())]
    Mount {
        snapshot: String,
        mountpoint: PathBuf,
        #[source]
        source: ExecError,
    },

    #[error("error while getting hostname")]
    Hostname {
        #[source]
        source: Errno,
    },

    #[error("error while starting {program}")]
    ArchiveSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("error while waiting for archiver")]
    ArchiveWait {
        #[source]
        source: io::Error,
    },

    #[error("error while running borg ({status})")]
    ArchiveFailed { status: ExitStatus },

    #[error("unmount {} failed, need manual cleanup", .mountpoint.display())]
    Unmount {
        mountpoint: PathBuf,
        #[source]
        source: Errno,
        /// The failure that was already on its way out when the unmount ran.
        pending: Option<Box<BackupError>>,
    },
}

impl BackupError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LockOpen { .. } | Self::LockHeld { .. } => ErrorKind::Lock,
            Self::SnapshotCreate { .. }
            | Self::SnapshotList { .. }
            | Self::NoSnapshots
            | Self::SnapshotDelete { .. } => ErrorKind::Snapshot,
            Self::MalformedIdentifier { .. } => ErrorKind::MalformedIdentifier,
            Self::Mountpoint { .. } | Self::Mount { .. } => ErrorKind::Mount,
            Self::Hostname { .. } => ErrorKind::Host,
            Self::ArchiveSpawn { .. } | Self::ArchiveWait { .. } | Self::ArchiveFailed { .. } => {
                ErrorKind::Archive
            },
            Self::Unmount { .. } => ErrorKind::Unmount,
        }
    }

    /// True when the host was left with a stale mount.
    pub const fn needs_manual_cleanup(&self) -> bool {
        matches!(self, Self::Unmount { .. })
    }

    /// The error that preceded a failed unmount, if any.
    pub fn pending(&self) -> Option<&Self> {
        match self {
            Self::Unmount { pending, .. } => pending.as_deref(),
            _ => None,
        }
    }
}
