//! Per-run parameters.
//!
//! Everything the sync core needs from its caller is carried here explicitly;
//! nothing below the CLI reads the process environment.

use std::path::{Path, PathBuf};

use crate::types::Version;

/// Parameters for one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root of the installation the files are deployed into.
    pub install_prefix: PathBuf,
    /// Version string substituted into installed files.
    pub version: Version,
    /// Root of the checked-out source tree; manifest group sources are relative to it.
    pub source_root: PathBuf,
    /// Review diff used to decide whether a locally-modified file may be overwritten.
    pub pr_diff: Option<PathBuf>,
}

impl SyncConfig {
    pub fn new(
        install_prefix: impl Into<PathBuf>,
        version: impl Into<Version>,
        source_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            install_prefix: install_prefix.into(),
            version: version.into(),
            source_root: source_root.into(),
            pr_diff: None,
        }
    }

    /// Attach the review diff reference. An empty path counts as unset.
    pub fn with_pr_diff(mut self, pr_diff: Option<PathBuf>) -> Self {
        self.pr_diff = normalize_artifact(pr_diff);
        self
    }

    pub fn pr_diff(&self) -> Option<&Path> {
        self.pr_diff.as_deref()
    }
}

/// Map an empty artifact reference to `None`.
pub fn normalize_artifact(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pr_diff_is_unset() {
        let cfg = SyncConfig::new("/opt/prefix", "2023.06", ".").with_pr_diff(Some(PathBuf::new()));
        assert!(cfg.pr_diff().is_none());
    }

    #[test]
    fn pr_diff_is_kept() {
        let cfg = SyncConfig::new("/opt/prefix", "2023.06", ".")
            .with_pr_diff(Some(PathBuf::from("/tmp/pr.diff")));
        assert_eq!(cfg.pr_diff(), Some(Path::new("/tmp/pr.diff")));
        assert_eq!(cfg.version.to_string(), "2023.06");
    }
}
