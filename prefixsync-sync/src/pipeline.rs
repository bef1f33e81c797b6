//! Full deployment run: copy every manifest group, then rewrite placeholders.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use prefixsync_core::{Manifest, SubstitutionSpec, SyncConfig};

use crate::batch::{sync_list, BatchReport};
use crate::decision::CopyEngine;
use crate::error::SyncError;
use crate::oracle::{DiffOracle, GitToplevel};
use crate::substitute::{apply_substitution, Stamps, SubstitutionRule, UpdateOutcome};

/// Outcome of one manifest substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubstitutionOutcome {
    Applied { outcome: UpdateOutcome },
    /// Dry-run only: the target is not installed yet, so there is nothing to inspect.
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutionReport {
    pub file: PathBuf,
    pub pattern: String,
    pub outcome: SubstitutionOutcome,
}

impl SubstitutionReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, SubstitutionOutcome::Failed { .. })
    }
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub groups: Vec<BatchReport>,
    pub substitutions: Vec<SubstitutionReport>,
}

impl RunReport {
    /// Files written (or, in dry-run, that would be written).
    pub fn writes(&self) -> usize {
        let copies: usize = self.groups.iter().map(BatchReport::copies).sum();
        let rewrites = self
            .substitutions
            .iter()
            .filter(|s| {
                matches!(
                    s.outcome,
                    SubstitutionOutcome::Applied {
                        outcome: UpdateOutcome::Rewritten | UpdateOutcome::WouldRewrite
                    }
                )
            })
            .count();
        copies + rewrites
    }

    pub fn rejects(&self) -> usize {
        self.groups.iter().map(BatchReport::rejects).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.groups.iter().any(|g| g.failures() > 0)
            || self.substitutions.iter().any(SubstitutionReport::is_failure)
    }

    pub fn to_json_pretty(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run the manifest against `config`, resolving repositories with git.
///
/// This is the canonical entrypoint for `prefixsync sync`.
pub fn run(config: &SyncConfig, manifest: &Manifest, dry_run: bool) -> RunReport {
    let oracle = DiffOracle::new(config.pr_diff(), GitToplevel);
    run_with(config, manifest, oracle, dry_run)
}

/// [`run`] with a caller-supplied oracle.
pub fn run_with(
    config: &SyncConfig,
    manifest: &Manifest,
    oracle: DiffOracle,
    dry_run: bool,
) -> RunReport {
    let started_at = Utc::now();
    if !oracle.has_artifact() {
        tracing::info!("no PR diff available; locally modified files will be left untouched");
    }
    let engine = CopyEngine::new(oracle)
        .with_stamps(Stamps::from_manifest(manifest, config))
        .with_dry_run(dry_run);

    let mut groups = Vec::with_capacity(manifest.groups.len());
    for group in &manifest.groups {
        let source_dir = group.source.under(&config.source_root);
        let dest_dir = group.target.under(&config.install_prefix);
        let report = match sync_list(&engine, &source_dir, &dest_dir, &group.files) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("skipping group {}: {e}", group.target);
                BatchReport::failed(&source_dir, &dest_dir, &group.files, &e.to_string(), dry_run)
            }
        };
        groups.push(report);
    }

    let substitutions = manifest
        .substitutions
        .iter()
        .map(|spec| substitute_one(config, spec, dry_run))
        .collect();

    RunReport {
        started_at,
        dry_run,
        groups,
        substitutions,
    }
}

fn substitute_one(config: &SyncConfig, spec: &SubstitutionSpec, dry_run: bool) -> SubstitutionReport {
    let file = spec.file.under(&config.install_prefix);
    if dry_run && !file.exists() {
        return SubstitutionReport {
            file,
            pattern: spec.pattern.clone(),
            outcome: SubstitutionOutcome::Skipped {
                reason: "target not installed yet".to_string(),
            },
        };
    }
    let outcome = match SubstitutionRule::from_spec(spec, config)
        .and_then(|rule| apply_substitution(&rule, &file, dry_run))
    {
        Ok(outcome) => SubstitutionOutcome::Applied { outcome },
        Err(e) => {
            tracing::error!("substitution in {} failed: {e}", file.display());
            SubstitutionOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };
    SubstitutionReport {
        file,
        pattern: spec.pattern.clone(),
        outcome,
    }
}
