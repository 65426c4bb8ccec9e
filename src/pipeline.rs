//! The backup run, start to finish.
//!
//! # Stages (in order)
//!
//! | # | Stage             | On failure                                   |
//! |---|-------------------|----------------------------------------------|
//! | 1 | Lock              | abort                                        |
//! | 2 | Create snapshot   | abort                                        |
//! | 3 | Resolve snapshot  | abort (malformed identifiers stop here)      |
//! | 4 | Mount             | abort                                        |
//! | 5 | Resolve hostname  | unmount, then abort                          |
//! | 6 | Archive           | unmount, then abort; the snapshot is kept    |
//! | 7 | Delete snapshot   | unmount, then abort                          |
//! | 8 | Unmount           | always runs once 4 succeeded                 |
//!
//! A failed unmount is escalated to [`BackupError::Unmount`], which carries
//! whatever error stages 5–7 produced.
//!
//! An interrupted archive counts as finished, so the snapshot is still
//! deleted afterwards.  That means a SIGINT mid-archive drops the local
//! snapshot even though the archive may be a partial checkpoint.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    archive::{ArchiveOutcome, Archiver},
    cancel::CancelToken,
    config::BackupConfig,
    error::BackupError,
    host::Host,
    lock::ProcessLock,
    mount::Mounter,
    snapshot::{SnapshotId, SnapshotService},
    ui,
};

/// External collaborators of a run.
pub struct Services {
    pub snapshots: Box<dyn SnapshotService>,
    pub mounter: Box<dyn Mounter>,
    pub archiver: Box<dyn Archiver>,
    pub host: Box<dyn Host>,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub snapshot: SnapshotId,
    pub archive_name: String,
    pub outcome: ArchiveOutcome,
}

pub struct Orchestrator {
    config: BackupConfig,
    services: Services,
}

impl Orchestrator {
    pub fn new(config: BackupConfig, services: Services) -> Self {
        Self { config, services }
    }

    pub fn run(&self, cancel: &CancelToken) -> Result<RunReport, BackupError> {
        let lock = ProcessLock::acquire(&self.config.lock_file)?;
        debug!(lock = %lock.path().display(), "holding run lock");

        ui::stage("Create snapshot", || self.services.snapshots.create_snapshot())?;

        let snapshot = ui::stage("Resolve snapshot", || {
            let raw = self.services.snapshots.latest_identifier()?;
            SnapshotId::parse(&raw)
        })?;
        info!(%snapshot, "using latest local snapshot");

        let mountpoint = self.config.mountpoint.as_path();
        ui::stage("Mount", || {
            self.services.mounter.mount(snapshot.as_str(), mountpoint)
        })?;

        let result = self.archive_mounted(&snapshot, mountpoint, cancel);

        match ui::stage("Unmount", || self.services.mounter.unmount(mountpoint)) {
            Ok(()) => result,
            Err(source) => Err(BackupError::Unmount {
                mountpoint: mountpoint.to_path_buf(),
                source,
                pending: result.err().map(Box::new),
            }),
        }
    }

    /// Stages that run while the snapshot is mounted.
    fn archive_mounted(
        &self,
        snapshot: &SnapshotId,
        mountpoint: &Path,
        cancel: &CancelToken,
    ) -> Result<RunReport, BackupError> {
        let hostname = self.services.host.hostname()?;
        let archive_name = snapshot.archive_name(&hostname);
        info!(%archive_name, "creating archive");

        let outcome = ui::live_stage("Archive", || {
            self.services.archiver.create_archive(
                cancel,
                &archive_name,
                mountpoint,
                &self.config.borg_args,
            )
        })?;

        if outcome == ArchiveOutcome::Interrupted {
            warn!(
                %snapshot,
                "archive was interrupted; deleting the local snapshot anyway"
            );
        }

        ui::stage("Delete snapshot", || {
            self.services.snapshots.delete_snapshot(snapshot.as_str())
        })?;

        Ok(RunReport {
            snapshot: snapshot.clone(),
            archive_name,
            outcome,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell, os::unix::process::ExitStatusExt, process::ExitStatus, rc::Rc,
    };

    use nix::errno::Errno;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        error::{ErrorKind, ExecError},
        snapshot::latest_from_listing,
    };

    const SNAPSHOT: &str = "com.apple.TimeMachine.2024-03-01-101500";

    // ── Fakes ─────────────────────────────────────────────────────────────────

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum ArchiveBehaviour {
        Succeed,
        Fail,
        Interrupted,
    }

    /// How each fake collaborator should respond.
    #[derive(Clone)]
    struct Script {
        fail_create: bool,
        listing: &'static str,
        fail_mount: bool,
        fail_hostname: bool,
        archive: ArchiveBehaviour,
        fail_delete: bool,
        fail_unmount: bool,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                fail_create: false,
                listing: "com.apple.TimeMachine.2024-02-29-090000\ncom.apple.TimeMachine.2024-03-01-101500\n",
                fail_mount: false,
                fail_hostname: false,
                archive: ArchiveBehaviour::Succeed,
                fail_delete: false,
                fail_unmount: false,
            }
        }
    }

    /// Ordered record of every call made to the fakes.
    #[derive(Clone, Default)]
    struct Journal(Rc<RefCell<Vec<String>>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.borrow_mut().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.borrow().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
        }
    }

    fn exec_failure(command: &str) -> ExecError {
        ExecError::Failed {
            command: command.into(),
            status: ExitStatus::from_raw(1 << 8),
            stderr: String::new(),
        }
    }

    struct Fake {
        script: Script,
        journal: Journal,
    }

    impl SnapshotService for Fake {
        fn create_snapshot(&self) -> Result<(), BackupError> {
            self.journal.push("create");
            if self.script.fail_create {
                return Err(BackupError::SnapshotCreate {
                    source: exec_failure("tmutil localsnapshot"),
                });
            }
            Ok(())
        }

        fn latest_identifier(&self) -> Result<String, BackupError> {
            self.journal.push("list");
            latest_from_listing(self.script.listing)
        }

        fn delete_snapshot(&self, identifier: &str) -> Result<(), BackupError> {
            let id = SnapshotId::parse(identifier)?;
            self.journal.push(format!("delete {}", id.uid()));
            if self.script.fail_delete {
                return Err(BackupError::SnapshotDelete {
                    identifier: identifier.into(),
                    source: exec_failure("tmutil deletelocalsnapshots"),
                });
            }
            Ok(())
        }
    }

    impl Mounter for Fake {
        fn mount(&self, snapshot: &str, mountpoint: &Path) -> Result<(), BackupError> {
            self.journal
                .push(format!("mount {snapshot} {}", mountpoint.display()));
            if self.script.fail_mount {
                return Err(BackupError::Mount {
                    snapshot: snapshot.into(),
                    mountpoint: mountpoint.to_path_buf(),
                    source: exec_failure("mount"),
                });
            }
            Ok(())
        }

        fn unmount(&self, mountpoint: &Path) -> nix::Result<()> {
            self.journal.push(format!("unmount {}", mountpoint.display()));
            if self.script.fail_unmount {
                return Err(Errno::EBUSY);
            }
            Ok(())
        }
    }

    impl Archiver for Fake {
        fn create_archive(
            &self,
            _cancel: &CancelToken,
            archive_name: &str,
            mountpoint: &Path,
            extra_args: &[String],
        ) -> Result<ArchiveOutcome, BackupError> {
            self.journal.push(format!(
                "archive {archive_name} {} {}",
                mountpoint.display(),
                extra_args.join(" ")
            ));
            match self.script.archive {
                ArchiveBehaviour::Succeed => Ok(ArchiveOutcome::Completed),
                ArchiveBehaviour::Interrupted => Ok(ArchiveOutcome::Interrupted),
                ArchiveBehaviour::Fail => Err(BackupError::ArchiveFailed {
                    status: ExitStatus::from_raw(2 << 8),
                }),
            }
        }
    }

    impl Host for Fake {
        fn hostname(&self) -> Result<String, BackupError> {
            self.journal.push("hostname");
            if self.script.fail_hostname {
                return Err(BackupError::Hostname {
                    source: Errno::EFAULT,
                });
            }
            Ok("studio".into())
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        journal: Journal,
        dir: TempDir,
    }

    fn harness(script: Script) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let fake = |journal: &Journal| -> Box<Fake> {
            Box::new(Fake {
                script: script.clone(),
                journal: journal.clone(),
            })
        };
        let config = BackupConfig {
            mountpoint: "/tmp/snapshot".into(),
            lock_file: dir.path().join("borg.lock"),
            borg_args: vec!["--stats".into()],
        };
        let services = Services {
            snapshots: fake(&journal),
            mounter: fake(&journal),
            archiver: fake(&journal),
            host: fake(&journal),
        };
        Harness {
            orchestrator: Orchestrator::new(config, services),
            journal,
            dir,
        }
    }

    fn run(script: Script) -> (Result<RunReport, BackupError>, Journal) {
        let h = harness(script);
        let result = h.orchestrator.run(&CancelToken::new());
        (result, h.journal)
    }

    // ── Happy path ────────────────────────────────────────────────────────────

    #[test]
    fn stages_run_in_order() {
        let (result, journal) = run(Script::default());
        let report = result.unwrap();

        assert_eq!(report.snapshot.as_str(), SNAPSHOT);
        assert_eq!(report.archive_name, "2024-03-01-101500@studio");
        assert_eq!(report.outcome, ArchiveOutcome::Completed);
        assert_eq!(journal.entries(), vec![
            "create".to_string(),
            "list".into(),
            format!("mount {SNAPSHOT} /tmp/snapshot"),
            "hostname".into(),
            "archive 2024-03-01-101500@studio /tmp/snapshot --stats".into(),
            "delete 2024-03-01-101500".into(),
            "unmount /tmp/snapshot".into(),
        ]);
    }

    // ── Failures before mounting ──────────────────────────────────────────────

    #[test]
    fn held_lock_stops_before_any_side_effect() {
        let h = harness(Script::default());
        let _held = ProcessLock::acquire(&h.dir.path().join("borg.lock")).unwrap();

        let err = h.orchestrator.run(&CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lock);
        assert!(h.journal.entries().is_empty());
    }

    #[test]
    fn create_failure_stops_run() {
        let (result, journal) = run(Script {
            fail_create: true,
            ..Script::default()
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Snapshot);
        assert_eq!(journal.entries(), vec!["create"]);
    }

    #[test]
    fn empty_listing_fails_without_mounting() {
        let (result, journal) = run(Script {
            listing: "",
            ..Script::default()
        });
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "no available snapshots");
        assert_eq!(journal.count("mount"), 0);
        assert_eq!(journal.count("unmount"), 0);
    }

    #[test]
    fn malformed_identifier_never_mounts_or_deletes() {
        for listing in ["snapshot-without-dots\n", "a.b.c\n", "a.b.c.d.e\n"] {
            let (result, journal) = run(Script {
                listing,
                ..Script::default()
            });
            assert_eq!(
                result.unwrap_err().kind(),
                ErrorKind::MalformedIdentifier,
                "{listing:?}"
            );
            assert_eq!(journal.count("mount"), 0);
            assert_eq!(journal.count("delete"), 0);
            assert_eq!(journal.count("archive"), 0);
        }
    }

    #[test]
    fn mount_failure_does_not_unmount() {
        let (result, journal) = run(Script {
            fail_mount: true,
            ..Script::default()
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Mount);
        assert_eq!(journal.count("unmount"), 0);
        assert_eq!(journal.count("archive"), 0);
    }

    // ── Failures while mounted ────────────────────────────────────────────────

    #[test]
    fn archive_failure_keeps_snapshot_and_unmounts_once() {
        let (result, journal) = run(Script {
            archive: ArchiveBehaviour::Fail,
            ..Script::default()
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Archive);
        assert_eq!(journal.count("delete"), 0);
        assert_eq!(journal.count("unmount"), 1);
    }

    #[test]
    fn interrupted_archive_still_deletes_snapshot() {
        let (result, journal) = run(Script {
            archive: ArchiveBehaviour::Interrupted,
            ..Script::default()
        });
        assert_eq!(result.unwrap().outcome, ArchiveOutcome::Interrupted);
        assert_eq!(journal.count("delete"), 1);
        assert_eq!(journal.count("unmount"), 1);
    }

    #[test]
    fn delete_failure_still_unmounts_once() {
        let (result, journal) = run(Script {
            fail_delete: true,
            ..Script::default()
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Snapshot);
        assert_eq!(journal.count("unmount"), 1);
        assert_eq!(journal.entries().last().unwrap(), "unmount /tmp/snapshot");
    }

    #[test]
    fn hostname_failure_still_unmounts_once() {
        let (result, journal) = run(Script {
            fail_hostname: true,
            ..Script::default()
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Host);
        assert_eq!(journal.count("archive"), 0);
        assert_eq!(journal.count("unmount"), 1);
    }

    // ── Unmount escalation ────────────────────────────────────────────────────

    #[test]
    fn unmount_failure_after_success_needs_manual_cleanup() {
        let (result, journal) = run(Script {
            fail_unmount: true,
            ..Script::default()
        });
        let err = result.unwrap_err();
        assert!(err.needs_manual_cleanup());
        assert!(err.pending().is_none());
        assert_eq!(journal.count("delete"), 1);
        assert_eq!(journal.count("unmount"), 1);
    }

    #[test]
    fn unmount_failure_keeps_earlier_archive_error() {
        let (result, journal) = run(Script {
            archive: ArchiveBehaviour::Fail,
            fail_unmount: true,
            ..Script::default()
        });
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unmount);
        assert_eq!(err.pending().map(BackupError::kind), Some(ErrorKind::Archive));
        assert_eq!(journal.count("unmount"), 1);
    }

    #[test]
    fn lock_is_released_after_run() {
        let h = harness(Script::default());
        h.orchestrator.run(&CancelToken::new()).unwrap();
        assert!(ProcessLock::acquire(&h.dir.path().join("borg.lock")).is_ok());
    }
}
