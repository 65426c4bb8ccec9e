//! Configuration types and loading logic.
//!
//! `Config` is a 1-to-1 mapping of the optional TOML config file.  Every
//! field has a default, so `borg-tm` runs without any file at all; command-line
//! flags are applied on top (see [`Config::apply_cli`]).
//!
//! # File format
//!
//! ```toml
//! [backup]
//! mountpoint = "/tmp/snapshot"       # keep stable across runs
//! lock_file  = "/var/run/borg.lock"
//! borg_args  = ["--stats", "--compression", "zstd,3"]
//!
//! [platform]
//! tmutil = "tmutil"
//! mount  = "mount"
//! borg   = "borg"
//! volume = "/"                       # volume to snapshot and mount
//! ```
//!
//! # Environment
//!
//! borg itself reads `BORG_REPO` and `BORG_PASSPHRASE`.  We only check that
//! both are set before touching the host, see [`require_env`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

pub const REPO_VAR: &str = "BORG_REPO";
pub const PASSPHRASE_VAR: &str = "BORG_PASSPHRASE";

// ─── Top-level ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub platform: PlatformConfig,
}

// ─── [backup] ─────────────────────────────────────────────────────────────────

/// What a single run needs to know.  Built once at startup, never mutated
/// after it is handed to the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackupConfig {
    /// Where the snapshot is mounted while borg reads it.
    ///
    /// Keep this stable: borg's file cache is keyed on absolute paths, so a
    /// moving mountpoint makes every run look like a full backup.
    #[serde(default = "default_mountpoint")]
    pub mountpoint: PathBuf,

    /// File used purely as a `flock` target to keep runs from overlapping.
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Extra arguments appended to `borg create`.
    #[serde(default)]
    pub borg_args: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            mountpoint: default_mountpoint(),
            lock_file: default_lock_file(),
            borg_args: vec![],
        }
    }
}

// ─── [platform] ───────────────────────────────────────────────────────────────

/// External tools invoked by the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PlatformConfig {
    #[serde(default = "default_tmutil")]
    pub tmutil: String,

    #[serde(default = "default_mount")]
    pub mount: String,

    #[serde(default = "default_borg")]
    pub borg: String,

    /// Volume that is snapshotted and whose snapshot gets mounted.
    #[serde(default = "default_volume")]
    pub volume: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            tmutil: default_tmutil(),
            mount: default_mount(),
            borg: default_borg(),
            volume: default_volume(),
        }
    }
}

// ─── Defaults ─────────────────────────────────────────────────────────────────

pub fn default_mountpoint() -> PathBuf {
    PathBuf::from("/tmp/snapshot")
}

pub fn default_lock_file() -> PathBuf {
    PathBuf::from("/var/run/borg.lock")
}

pub fn default_tmutil() -> String {
    "tmutil".into()
}

pub fn default_mount() -> String {
    "mount".into()
}

pub fn default_borg() -> String {
    "borg".into()
}

pub fn default_volume() -> String {
    "/".into()
}

// ─── CLI overrides ────────────────────────────────────────────────────────────

impl Config {
    /// Apply command-line flags on top of file values.  Flags win.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref mountpoint) = cli.mountpoint {
            self.backup.mountpoint.clone_from(mountpoint);
        }
        if let Some(ref lock_file) = cli.lock_file {
            self.backup.lock_file.clone_from(lock_file);
        }
        if let Some(ref args) = cli.borg_args {
            self.backup.borg_args = split_borg_args(args);
        }
    }
}

/// Tokenize the `--borg-args` string on whitespace, dropping empty tokens.
pub fn split_borg_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Per-user config location, e.g. `~/.config/borg-tm/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|d| d.join("borg-tm").join("config.toml"))
}

/// Resolve the effective configuration.
///
/// An explicit `--config` path must exist.  Without one, the per-user file
/// is read when present and defaults are used otherwise.  Flags are applied
/// last.
pub fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = match cli.config {
        Some(ref path) => load_config(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => load_config(&path)?,
            _ => Config::default(),
        },
    };
    cfg.apply_cli(cli);
    Ok(cfg)
}

/// Read and parse a `Config` from `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ─── Environment ──────────────────────────────────────────────────────────────

/// Read `name` from the environment, failing if it is unset or empty.
pub fn require_env(name: &str) -> Result<String> {
    require_nonempty(name, std::env::var(name).ok())
}

fn require_nonempty(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("{name} not specified"),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
