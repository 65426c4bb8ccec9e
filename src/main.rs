//! `borg-tm`: Time Machine style backups with borg.
//!
//! # Overview
//!
//! Each run takes a fresh local APFS snapshot, mounts it read-only, points
//! `borg create` at the mounted snapshot and then tears everything down
//! again.  borg therefore always sees a consistent, frozen filesystem instead
//! of files that change underneath it.
//!
//! # Usage
//!
//! ```text
//! borg-tm                                   # one backup run (as root)
//! borg-tm --borg-args "--stats --list"      # extra flags for borg create
//! borg-tm --mountpoint /tmp/snapshot        # where the snapshot is mounted
//! borg-tm --print-config                    # show effective config and exit
//! borg-tm -V                                # version banner
//! ```
//!
//! # Exit codes
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | success (including a cleanly cancelled archive)    |
//! | 1    | the run failed                                     |
//! | 2    | the snapshot is still mounted: manual cleanup      |
//!
//! # Module layout
//!
//! | Module                   | Responsibility                              |
//! |--------------------------|---------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap               |
//! | [`config`]               | `Config` struct, TOML loader, env checks    |
//! | [`build_info`]           | Version / commit banner                     |
//! | [`error`]                | Error taxonomy                              |
//! | [`runner`]               | Argument construction helpers               |
//! | [`exec`]                 | Captured execution of external tools        |
//! | [`lock`]                 | `flock` run lock                            |
//! | [`cancel`]               | Cancellation token, signal listener         |
//! | [`snapshot`]             | Snapshot identifiers and `tmutil`           |
//! | [`mount`]                | Read-only snapshot mount / unmount          |
//! | [`host`]                 | Hostname lookup                             |
//! | [`archive`]              | borg supervision                            |
//! | [`pipeline`]             | Stage sequencing and cleanup                |
//! | [`ui`]                   | Spinner, stage lines, failure banners       |
//! | [`commands::run`]        | Default backup command                      |

mod archive;
mod build_info;
mod cancel;
mod cli;
mod commands;
mod config;
mod error;
mod exec;
mod host;
mod lock;
mod mount;
mod pipeline;
mod runner;
mod snapshot;
mod ui;

use std::process::ExitCode;

use anyhow::Result;
use build_info::BuildInfo;
use clap::Parser;
use cli::Cli;
use error::BackupError;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Exit status when the mountpoint was left mounted.
const MANUAL_CLEANUP_EXIT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let build = BuildInfo::current();

    if cli.version {
        eprint!("{}", build.render());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    match execute(&cli, &build) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn execute(cli: &Cli, build: &BuildInfo) -> Result<()> {
    let cfg = config::load(cli)?;

    if cli.print_config {
        println!("{cfg:#?}");
        return Ok(());
    }

    commands::run::run(&cfg, build)
}

/// Log and print `err`, choosing the exit code by severity.
fn report(err: &anyhow::Error) -> ExitCode {
    if let Some(backup_err) = err.downcast_ref::<BackupError>() {
        if backup_err.needs_manual_cleanup() {
            error!(kind = %backup_err.kind(), "{err:#}");
            ui::print_manual_cleanup(backup_err);
            return ExitCode::from(MANUAL_CLEANUP_EXIT);
        }
        error!(kind = %backup_err.kind(), "error while backup: {err:#}");
    } else {
        error!("error while backup: {err:#}");
    }
    ui::print_failure(err.as_ref());
    ExitCode::FAILURE
}

/// Install the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Fails only when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
