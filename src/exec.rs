//! Captured execution of external tools.
//!
//! Everything the backup core asks of the host (snapshots, mounting) goes
//! through [`CommandRunner`], so the services built on top can be exercised
//! with a recording fake instead of real `tmutil`/`mount` binaries.
//!
//! The archiver is the exception: borg output must stream live and borg must
//! be interruptible, so [`crate::archive`] drives its child process directly.

use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::ExecError;

/// Runs a fully-built argument vector (`args[0]` is the program).
pub trait CommandRunner {
    /// Run to completion, returning captured stdout.
    ///
    /// A non-zero exit status is an error that carries the captured stderr.
    fn run(&self, args: &[String]) -> Result<String, ExecError>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, args: &[String]) -> Result<String, ExecError> {
        let (prog, rest) = args.split_first().ok_or(ExecError::Empty)?;
        let command = args.join(" ");
        debug!(%command, "running");

        let output: Output = Command::new(prog)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

        if output.status.success() {
            if !stderr.is_empty() {
                debug!(%command, %stderr, "command wrote to stderr");
            }
            Ok(stdout)
        } else {
            Err(ExecError::Failed {
                command,
                status: output.status,
                stderr,
            })
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
