//! Read-only snapshot mounting.
//!
//! # How it works
//!
//! 1. Creates the mountpoint with `mkdir -p` semantics if it is missing.
//! 2. Runs `mount -t apfs -r -o -s=<snapshot> <volume> <mountpoint>`.
//! 3. On the way out, detaches the mountpoint with the `unmount(2)` syscall
//!    (`umount2(2)` on Linux).
//!
//! Unmount returns the raw OS error.  The pipeline wraps it in
//! [`BackupError::Unmount`], since the mount is left behind.

use std::path::Path;

use nix::mount::MntFlags;

use crate::{config::PlatformConfig, error::BackupError, exec::CommandRunner, runner};

pub trait Mounter {
    /// Mount `snapshot` read-only at `mountpoint`.
    fn mount(&self, snapshot: &str, mountpoint: &Path) -> Result<(), BackupError>;

    /// Detach whatever is mounted at `mountpoint`.
    fn unmount(&self, mountpoint: &Path) -> nix::Result<()>;
}

/// [`Mounter`] using the system `mount` tool and the unmount syscall.
#[derive(Debug)]
pub struct SnapshotMounter<R> {
    runner: R,
    platform: PlatformConfig,
}

impl<R: CommandRunner> SnapshotMounter<R> {
    pub const fn new(runner: R, platform: PlatformConfig) -> Self {
        Self { runner, platform }
    }
}

impl<R: CommandRunner> Mounter for SnapshotMounter<R> {
    fn mount(&self, snapshot: &str, mountpoint: &Path) -> Result<(), BackupError> {
        std::fs::create_dir_all(mountpoint).map_err(|source| BackupError::Mountpoint {
            path: mountpoint.to_path_buf(),
            source,
        })?;

        self.runner
            .run(&runner::mount_args(&self.platform, snapshot, mountpoint))
            .map(drop)
            .map_err(|source| BackupError::Mount {
                snapshot: snapshot.to_owned(),
                mountpoint: mountpoint.to_path_buf(),
                source,
            })
    }

    fn unmount(&self, mountpoint: &Path) -> nix::Result<()> {
        unmount_path(mountpoint)
    }
}

#[cfg(target_os = "linux")]
fn unmount_path(mountpoint: &Path) -> nix::Result<()> {
    nix::mount::umount2(mountpoint, MntFlags::empty())
}

#[cfg(not(target_os = "linux"))]
fn unmount_path(mountpoint: &Path) -> nix::Result<()> {
    nix::mount::unmount(mountpoint, MntFlags::empty())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
