//! Default command: one full backup run.
//!
//! # Preconditions (checked in order, before the host is touched)
//!
//! 1. `BORG_REPO` and `BORG_PASSPHRASE` are set and non-empty.
//! 2. The effective user is root.
//! 3. SIGINT/SIGTERM handlers are installed.
//!
//! After that the real services are wired into an
//! [`Orchestrator`](crate::pipeline::Orchestrator) and it runs once.

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::{
    archive::Borg,
    build_info::BuildInfo,
    cancel::{self, CancelToken},
    config::{self, Config, PASSPHRASE_VAR, REPO_VAR},
    exec::SystemRunner,
    host::LocalHost,
    mount::SnapshotMounter,
    pipeline::{Orchestrator, Services},
    snapshot::Tmutil,
    ui,
};

pub fn run(cfg: &Config, build: &BuildInfo) -> Result<()> {
    let repo = config::require_env(REPO_VAR)?;
    config::require_env(PASSPHRASE_VAR)?;

    if !nix::unistd::geteuid().is_root() {
        bail!("requires root privileges.");
    }

    let cancel = CancelToken::new();
    cancel::listen_for_signals(cancel.clone()).context("installing signal handlers")?;

    info!(
        version = build.version,
        commit = build.commit_id,
        %repo,
        mountpoint = %cfg.backup.mountpoint.display(),
        "starting backup"
    );
    debug!(?cfg, "effective configuration");

    let orchestrator = Orchestrator::new(cfg.backup.clone(), services(cfg));
    let report = orchestrator.run(&cancel)?;
    if cancel.is_cancelled() {
        info!("backup was cancelled, cleanup finished");
    }

    ui::print_done(&report);
    Ok(())
}

fn services(cfg: &Config) -> Services {
    let platform = &cfg.platform;
    Services {
        snapshots: Box::new(Tmutil::new(SystemRunner, platform.clone())),
        mounter: Box::new(SnapshotMounter::new(SystemRunner, platform.clone())),
        archiver: Box::new(Borg::new(platform.borg.clone())),
        host: Box::new(LocalHost),
    }
}
