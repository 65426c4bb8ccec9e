//! borg supervision.
//!
//! borg runs as a child process with its stdout and stderr both sent to our
//! stderr, unbuffered, so the operator sees progress live.  While the main
//! thread blocks in `wait()`, a scoped watcher thread polls the
//! [`CancelToken`]; when it fires, the watcher sends SIGINT (never SIGKILL) so
//! borg can write a checkpoint and exit on its own terms.
//!
//! A non-zero exit after we asked borg to stop is expected and reported as
//! [`ArchiveOutcome::Interrupted`]; only a non-zero exit nobody asked for is an
//! error.

use std::{
    io,
    path::Path,
    process::{Child, Command, Stdio},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use tracing::{debug, warn};

use crate::{cancel::CancelToken, error::BackupError, runner};

/// How long the watcher sleeps between checks for process exit.
const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// How an archive run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Completed,
    /// Cancellation was requested while the archiver was running.
    Interrupted,
}

pub trait Archiver {
    fn create_archive(
        &self,
        cancel: &CancelToken,
        archive_name: &str,
        mountpoint: &Path,
        extra_args: &[String],
    ) -> Result<ArchiveOutcome, BackupError>;
}

/// [`Archiver`] running `borg create`.
#[derive(Debug, Clone)]
pub struct Borg {
    program: String,
}

impl Borg {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Archiver for Borg {
    fn create_archive(
        &self,
        cancel: &CancelToken,
        archive_name: &str,
        mountpoint: &Path,
        extra_args: &[String],
    ) -> Result<ArchiveOutcome, BackupError> {
        let args = runner::borg_create_args(archive_name, mountpoint, extra_args);
        debug!(program = %self.program, ?args, "starting archiver");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(io::stderr())
            .stderr(io::stderr())
            .spawn()
            .map_err(|source| BackupError::ArchiveSpawn {
                program: self.program.clone(),
                source,
            })?;

        supervise(&mut child, cancel)
    }
}

/// Wait for `child`, interrupting it once if `cancel` fires first.
fn supervise(child: &mut Child, cancel: &CancelToken) -> Result<ArchiveOutcome, BackupError> {
    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(child.id() as i32);
    let exited = AtomicBool::new(false);
    let interrupted = AtomicBool::new(false);

    let status = thread::scope(|scope| {
        scope.spawn(|| watch(cancel, pid, &exited, &interrupted));
        let status = child.wait();
        exited.store(true, Ordering::Release);
        status
    })
    .map_err(|source| BackupError::ArchiveWait { source })?;

    // The watcher has been joined by the scope, so this read sees its write.
    let interrupted = interrupted.load(Ordering::Acquire);
    match (status.success(), interrupted) {
        (_, true) => {
            warn!(%status, "archiver stopped after interrupt");
            Ok(ArchiveOutcome::Interrupted)
        },
        (true, false) => Ok(ArchiveOutcome::Completed),
        (false, false) => Err(BackupError::ArchiveFailed { status }),
    }
}

fn watch(cancel: &CancelToken, pid: Pid, exited: &AtomicBool, interrupted: &AtomicBool) {
    loop {
        if cancel.wait_timeout(WATCH_INTERVAL) {
            if !exited.load(Ordering::Acquire) {
                debug!(%pid, "sending SIGINT to archiver");
                if let Err(err) = kill(pid, Signal::SIGINT) {
                    debug!(%pid, %err, "could not signal archiver");
                }
                interrupted.store(true, Ordering::Release);
            }
            return;
        }
        if exited.load(Ordering::Acquire) {
            return;
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
