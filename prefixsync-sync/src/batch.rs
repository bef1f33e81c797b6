//! Batch driver: one copy decision per manifest entry.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::decision::{CopyDecision, CopyEngine};
use crate::error::{io_err, SyncError};

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// The engine reached a decision (including rejects).
    Decided { decision: CopyDecision },
    /// The entry could not be processed (missing source, unwritable dest, ...).
    Failed { reason: String },
}

/// Per-entry report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub rel_path: PathBuf,
    pub source: PathBuf,
    pub dest: PathBuf,
    pub outcome: EntryOutcome,
}

impl EntryReport {
    pub fn decision(&self) -> Option<CopyDecision> {
        match &self.outcome {
            EntryOutcome::Decided { decision } => Some(*decision),
            EntryOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Failed { .. })
    }

    /// Human-readable explanation of the outcome.
    pub fn reason(&self) -> String {
        match &self.outcome {
            EntryOutcome::Decided { decision } => decision.reason().to_string(),
            EntryOutcome::Failed { reason } => format!("failed: {reason}"),
        }
    }
}

/// Outcome of syncing one (source dir, dest dir) list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub dry_run: bool,
    pub entries: Vec<EntryReport>,
}

impl BatchReport {
    /// A list that could not be processed at all; every entry fails with `reason`.
    pub fn failed<I, P>(
        source_dir: &Path,
        dest_dir: &Path,
        relative_paths: I,
        reason: &str,
        dry_run: bool,
    ) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let entries = relative_paths
            .into_iter()
            .map(|rel| {
                let rel = rel.as_ref();
                EntryReport {
                    rel_path: rel.to_path_buf(),
                    source: source_dir.join(rel),
                    dest: dest_dir.join(rel),
                    outcome: EntryOutcome::Failed {
                        reason: reason.to_string(),
                    },
                }
            })
            .collect();
        Self {
            source_dir: source_dir.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
            dry_run,
            entries,
        }
    }

    pub fn count(&self, decision: CopyDecision) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision() == Some(decision))
            .count()
    }

    /// Entries that were (or, in dry-run, would be) copied.
    pub fn copies(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision().is_some_and(|d| d.is_copy()))
            .count()
    }

    pub fn rejects(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision().is_some_and(|d| d.is_reject()))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failure()).count()
    }
}

/// Run the copy engine over `relative_paths`, in order.
///
/// Creates `dest_dir` first (unless dry-run); failing to do so is the only
/// error returned. Per-entry errors are recorded as
/// [`EntryOutcome::Failed`] and processing continues with the next entry.
pub fn sync_list<I, P>(
    engine: &CopyEngine,
    source_dir: &Path,
    dest_dir: &Path,
    relative_paths: I,
) -> Result<BatchReport, SyncError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    if !engine.is_dry_run() {
        std::fs::create_dir_all(dest_dir).map_err(|e| io_err(dest_dir, e))?;
    }

    let mut entries = Vec::new();
    for rel in relative_paths {
        let rel = rel.as_ref();
        let source = source_dir.join(rel);
        let dest = dest_dir.join(rel);
        let outcome = match engine.decide_and_apply(&source, &dest) {
            Ok(decision) => EntryOutcome::Decided { decision },
            Err(e) => {
                tracing::error!("{}: {e}", rel.display());
                EntryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        entries.push(EntryReport {
            rel_path: rel.to_path_buf(),
            source,
            dest,
            outcome,
        });
    }

    Ok(BatchReport {
        source_dir: source_dir.to_path_buf(),
        dest_dir: dest_dir.to_path_buf(),
        dry_run: engine.is_dry_run(),
        entries,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
