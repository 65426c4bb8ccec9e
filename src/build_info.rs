//! Build metadata, captured once at startup.
//!
//! The commit id is injected at compile time through the `BORG_TM_COMMIT_ID`
//! environment variable (e.g. `BORG_TM_COMMIT_ID=$(git rev-parse HEAD) cargo
//! build`).  Nothing here is mutable; `main` builds one [`BuildInfo`] and hands
//! it to whoever needs it.

/// Immutable description of the running binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit_id: &'static str,
}

impl BuildInfo {
    /// Metadata baked into this build.
    pub const fn current() -> Self {
        Self {
            name: "Borg-TM",
            version: env!("CARGO_PKG_VERSION"),
            commit_id: match option_env!("BORG_TM_COMMIT_ID") {
                Some(id) => id,
                None => "unknown",
            },
        }
    }

    /// The `-V` banner.
    pub fn render(&self) -> String {
        format!(
            "{}\n\nVersion: {}\nCommitID: {}\n",
            self.name, self.version, self.commit_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_uses_package_version() {
        assert_eq!(BuildInfo::current().version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn render_matches_banner_layout() {
        let info = BuildInfo {
            name: "Borg-TM",
            version: "1.2.3",
            commit_id: "abc123",
        };
        assert_eq!(info.render(), "Borg-TM\n\nVersion: 1.2.3\nCommitID: abc123\n");
    }

    #[test]
    fn commit_id_is_never_empty() {
        assert!(!BuildInfo::current().commit_id.is_empty());
    }
}
