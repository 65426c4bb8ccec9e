//! Command argument construction helpers.
//!
//! This module *builds* the argument lists passed to `tmutil`, `mount` and
//! `borg`.  It does not execute anything: captured execution lives in
//! [`crate::exec`], borg supervision in [`crate::archive`].
//!
//! The borg invocation shape is fixed; other tooling parses archive names, so
//! `create ::<archive> <mountpoint> <extra...>` must not change.

use std::path::Path;

use crate::config::PlatformConfig;

// ─── tmutil ───────────────────────────────────────────────────────────────────

/// `tmutil localsnapshot`
pub fn tmutil_create_args(platform: &PlatformConfig) -> Vec<String> {
    vec![platform.tmutil.clone(), "localsnapshot".into()]
}

/// `tmutil listlocalsnapshots <volume>`
pub fn tmutil_list_args(platform: &PlatformConfig) -> Vec<String> {
    vec![
        platform.tmutil.clone(),
        "listlocalsnapshots".into(),
        platform.volume.clone(),
    ]
}

/// `tmutil deletelocalsnapshots <uid>`
pub fn tmutil_delete_args(platform: &PlatformConfig, uid: &str) -> Vec<String> {
    vec![
        platform.tmutil.clone(),
        "deletelocalsnapshots".into(),
        uid.into(),
    ]
}

// ─── mount ────────────────────────────────────────────────────────────────────

/// `mount -t apfs -r -o -s=<snapshot> <volume> <mountpoint>`
///
/// There is no snapshot-aware mount syscall wrapper to call, so the system
/// `mount` tool does it.
pub fn mount_args(platform: &PlatformConfig, snapshot: &str, mountpoint: &Path) -> Vec<String> {
    vec![
        platform.mount.clone(),
        "-t".into(),
        "apfs".into(),
        "-r".into(),
        "-o".into(),
        format!("-s={snapshot}"),
        platform.volume.clone(),
        mountpoint.to_string_lossy().into_owned(),
    ]
}

// ─── borg ─────────────────────────────────────────────────────────────────────

/// Arguments (without the program) for `borg create`.
pub fn borg_create_args(archive_name: &str, mountpoint: &Path, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "create".into(),
        format!("::{archive_name}"),
        mountpoint.to_string_lossy().into_owned(),
    ];
    args.extend(extra.iter().cloned());
    args
}

// ─── Tests ────────────────────────────────────────────────────────────────────
