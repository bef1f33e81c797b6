//! `prefixsync sync` — deploy manifest files and stamp the version.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use prefixsync_core::SyncConfig;
use prefixsync_sync::{
    pipeline, BatchReport, CopyDecision, EntryOutcome, RunReport, SubstitutionOutcome,
    UpdateOutcome,
};

use super::DeployTarget;

/// Arguments for `prefixsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: DeployTarget,

    /// Version stamped into installed files.
    #[arg(long, env = "EESSI_VERSION", value_name = "VERSION")]
    pub eessi_version: String,

    /// Show what would be done without writing any files.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the full run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let manifest = self.target.load_manifest()?;
        let config = SyncConfig::new(
            &self.target.install_prefix,
            self.eessi_version.as_str(),
            &self.target.source_root,
        )
        .with_pr_diff(self.target.pr_diff.clone());

        let report = pipeline::run(&config, &manifest, self.dry_run);

        if self.json {
            println!(
                "{}",
                report
                    .to_json_pretty()
                    .context("failed to serialize sync report")?
            );
        } else {
            print_report(&report);
        }

        if report.has_failures() {
            bail!("some files could not be synced; see the report above");
        }
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    for group in &report.groups {
        print_group(prefix, group);
    }

    for sub in &report.substitutions {
        let (glyph, detail) = match &sub.outcome {
            SubstitutionOutcome::Applied {
                outcome: UpdateOutcome::Rewritten,
            } => ("✎".green(), "rewritten".to_string()),
            SubstitutionOutcome::Applied {
                outcome: UpdateOutcome::WouldRewrite,
            } => ("~".green(), "would rewrite".to_string()),
            SubstitutionOutcome::Applied {
                outcome: UpdateOutcome::Unchanged,
            } => ("·".bright_black(), "unchanged".to_string()),
            SubstitutionOutcome::Skipped { reason } => ("·".bright_black(), reason.clone()),
            SubstitutionOutcome::Failed { reason } => ("✗".red().bold(), format!("failed: {reason}")),
        };
        println!(
            "{prefix}{glyph}  {} [{}]  {detail}",
            sub.file.display(),
            sub.pattern
        );
    }

    println!(
        "{prefix}{} written, {} left untouched{}",
        report.writes(),
        report.rejects(),
        if report.has_failures() {
            ", with failures".red().to_string()
        } else {
            String::new()
        }
    );
}

fn print_group(prefix: &str, group: &BatchReport) {
    let status = if group.failures() > 0 {
        "✗".red().bold()
    } else {
        "✓".green()
    };
    println!(
        "{prefix}{status} {} → {} ({} copied, {} unchanged, {} left untouched, {} failed)",
        group.source_dir.display(),
        group.dest_dir.display(),
        group.copies(),
        group.count(CopyDecision::Skip),
        group.rejects(),
        group.failures(),
    );

    for entry in &group.entries {
        let glyph = match &entry.outcome {
            EntryOutcome::Decided { decision } => decision_glyph(*decision, group.dry_run),
            EntryOutcome::Failed { .. } => "✗".red().bold().to_string(),
        };
        println!("  {glyph}  {}  {}", entry.rel_path.display(), entry.reason());
    }
}

fn decision_glyph(decision: CopyDecision, dry_run: bool) -> String {
    match decision {
        CopyDecision::CopyNew | CopyDecision::CopyChanged if dry_run => "~".green().to_string(),
        CopyDecision::CopyNew => "+".green().to_string(),
        CopyDecision::CopyChanged => "✎".green().to_string(),
        CopyDecision::Skip => "·".bright_black().to_string(),
        CopyDecision::RejectNotInDiff
        | CopyDecision::RejectNoRepo
        | CopyDecision::RejectNoDiffArtifact
        | CopyDecision::RejectUnknown => "!".yellow().bold().to_string(),
    }
}
