//! Local snapshot lifecycle: create, find the newest, delete.
//!
//! # Identifiers
//!
//! `tmutil listlocalsnapshots` prints one identifier per line, oldest first,
//! each shaped `prefix.date.time.uid` (four dot-separated fields, e.g.
//! `com.apple.TimeMachine.2024-03-01-101500`).  The fourth field is what
//! `tmutil deletelocalsnapshots` expects and what the archive is named after.
//! Anything that is not exactly four fields is rejected before it can reach
//! `mount` or `tmutil deletelocalsnapshots`.

use std::fmt;

use crate::{config::PlatformConfig, error::BackupError, exec::CommandRunner, runner};

const ID_FIELDS: usize = 4;

// ─── SnapshotId ───────────────────────────────────────────────────────────────

/// A validated snapshot identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotId {
    raw: String,
    uid_start: usize,
}

impl SnapshotId {
    pub fn parse(raw: &str) -> Result<Self, BackupError> {
        let fields: Vec<&str> = raw.split('.').collect();
        if fields.len() != ID_FIELDS {
            return Err(BackupError::MalformedIdentifier {
                identifier: raw.to_owned(),
            });
        }
        let uid = fields[ID_FIELDS - 1];
        Ok(Self {
            raw: raw.to_owned(),
            uid_start: raw.len() - uid.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fourth field; the deletion key.
    pub fn uid(&self) -> &str {
        &self.raw[self.uid_start..]
    }

    /// `<uid>@<hostname>`
    pub fn archive_name(&self, hostname: &str) -> String {
        format!("{}@{hostname}", self.uid())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Pick the newest identifier out of a listing: the last non-empty line.
pub fn latest_from_listing(output: &str) -> Result<String, BackupError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(str::to_owned)
        .ok_or(BackupError::NoSnapshots)
}

// ─── Service ──────────────────────────────────────────────────────────────────

pub trait SnapshotService {
    /// Take a new local snapshot.
    fn create_snapshot(&self) -> Result<(), BackupError>;

    /// Identifier of the most recently created snapshot.
    fn latest_identifier(&self) -> Result<String, BackupError>;

    /// Delete the snapshot named by `identifier` (validated first).
    fn delete_snapshot(&self, identifier: &str) -> Result<(), BackupError>;
}

/// [`SnapshotService`] driving `tmutil`.
#[derive(Debug)]
pub struct Tmutil<R> {
    runner: R,
    platform: PlatformConfig,
}

impl<R: CommandRunner> Tmutil<R> {
    pub const fn new(runner: R, platform: PlatformConfig) -> Self {
        Self { runner, platform }
    }
}

impl<R: CommandRunner> SnapshotService for Tmutil<R> {
    fn create_snapshot(&self) -> Result<(), BackupError> {
        self.runner
            .run(&runner::tmutil_create_args(&self.platform))
            .map(drop)
            .map_err(|source| BackupError::SnapshotCreate { source })
    }

    fn latest_identifier(&self) -> Result<String, BackupError> {
        let listing = self
            .runner
            .run(&runner::tmutil_list_args(&self.platform))
            .map_err(|source| BackupError::SnapshotList { source })?;
        latest_from_listing(&listing)
    }

    fn delete_snapshot(&self, identifier: &str) -> Result<(), BackupError> {
        let id = SnapshotId::parse(identifier)?;
        self.runner
            .run(&runner::tmutil_delete_args(&self.platform, id.uid()))
            .map(drop)
            .map_err(|source| BackupError::SnapshotDelete {
                identifier: identifier.to_owned(),
                source,
            })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
