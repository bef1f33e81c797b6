//! Subcommand implementations and the arguments they share.

pub mod diff;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use prefixsync_core::{manifest, Manifest};

/// Where to deploy from, where to deploy to, and what.
#[derive(Args, Debug)]
pub struct DeployTarget {
    /// Installation prefix the files are deployed into.
    #[arg(long = "prefix", env = "INSTALL_PREFIX", value_name = "DIR")]
    pub install_prefix: PathBuf,

    /// Manifest listing the files to deploy (YAML).
    #[arg(long, short = 'm', value_name = "FILE")]
    pub manifest: PathBuf,

    /// Root of the source checkout; manifest sources are relative to it.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub source_root: PathBuf,

    /// Diff of the change under review. Locally modified files are only
    /// overwritten when they appear in it.
    #[arg(long, env = "PR_DIFF", value_name = "FILE")]
    pub pr_diff: Option<PathBuf>,
}

impl DeployTarget {
    pub fn load_manifest(&self) -> Result<Manifest> {
        let manifest = manifest::load(&self.manifest)
            .with_context(|| format!("failed to load manifest {}", self.manifest.display()))?;
        tracing::debug!(
            "loaded {} ({} groups, {} files)",
            self.manifest.display(),
            manifest.groups.len(),
            manifest.entry_count()
        );
        Ok(manifest)
    }
}
