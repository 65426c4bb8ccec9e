//! Hostname lookup for archive naming.

use crate::error::BackupError;

pub trait Host {
    fn hostname(&self) -> Result<String, BackupError>;
}

/// The machine we are running on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl Host for LocalHost {
    fn hostname(&self) -> Result<String, BackupError> {
        let name = nix::unistd::gethostname().map_err(|source| BackupError::Hostname { source })?;
        Ok(name.to_string_lossy().into_owned())
    }
}
