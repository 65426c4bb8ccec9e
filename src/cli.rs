//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  The `Cli` struct is parsed once in `main` and then
//! passed (by reference) to the config loader.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name    = "borg-tm",
    about   = "Back up a local Time Machine snapshot with borg",
    // `-V` prints our own build banner instead of clap's one-liner.
    disable_version_flag = true,
    after_help = "\
This program must be run as root.

Environment variables:
  BORG_REPO        repository to backup to
  BORG_PASSPHRASE  passphrase for borg repository",
    help_template = "\
{before-help}{name}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Cli {
    /// Arguments passed to `borg create`, separated by whitespace.
    ///
    /// Example: `--borg-args "--stats --compression zstd,3"`.  Replaces any
    /// `borg_args` list from the config file.
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub borg_args: Option<String>,

    /// Mountpoint for the snapshot [default: /tmp/snapshot].
    ///
    /// Should be kept the same across backups so borg's file cache stays
    /// valid.
    #[arg(long, value_name = "PATH")]
    pub mountpoint: Option<PathBuf>,

    /// Lock file guarding against concurrent runs [default: /var/run/borg.lock].
    #[arg(long, value_name = "PATH")]
    pub lock_file: Option<PathBuf>,

    /// Path to a TOML config file.
    ///
    /// Without it, `~/.config/borg-tm/config.toml` (or the platform
    /// equivalent) is read when it exists.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print version and commit id, then exit.
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Print the effective configuration and exit without running anything.
    #[arg(long)]
    pub print_config: bool,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long)]
    pub verbose: bool,
}
