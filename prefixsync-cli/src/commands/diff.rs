//! `prefixsync diff` — show what a sync would change in installed files.

use anyhow::{Context, Result};
use clap::Args;

use prefixsync_core::{config::normalize_artifact, SyncConfig};
use prefixsync_sync::{diff_manifest, CopyEngine, DiffOracle, GitToplevel, Stamps};

use super::DeployTarget;

/// Arguments for `prefixsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: DeployTarget,

    /// Version the installed files were stamped with. Without it, files
    /// rewritten by a substitution show up as differing from their source.
    #[arg(long, env = "EESSI_VERSION", value_name = "VERSION")]
    pub eessi_version: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let manifest = self.target.load_manifest()?;
        let pr_diff = normalize_artifact(self.target.pr_diff.clone());
        let oracle = DiffOracle::new(pr_diff.as_deref(), GitToplevel);

        let stamps = match &self.eessi_version {
            Some(version) => {
                let config = SyncConfig::new(
                    &self.target.install_prefix,
                    version.as_str(),
                    &self.target.source_root,
                );
                Stamps::from_manifest(&manifest, &config)
            }
            None => Stamps::default(),
        };

        let diffs = diff_manifest(
            &self.target.source_root,
            &self.target.install_prefix,
            &manifest,
            CopyEngine::new(oracle).with_stamps(stamps),
        )
        .context("diff failed")?;

        if diffs.is_empty() {
            println!("No differences.");
            return Ok(());
        }

        for diff in diffs {
            println!("# {}: {}", diff.rel_path.display(), diff.decision.reason());
            if let Some(note) = diff.note {
                println!("# {note}");
            }
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.is_empty() && !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
