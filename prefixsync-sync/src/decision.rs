//! Copy decision engine.
//!
//! Decision order for a (source, dest) pair:
//! 1. `CopyNew` (dest absent; nothing to protect)
//! 2. `Skip` (dest is byte-identical to the source, or to the source with
//!    its [`Stamps`] applied)
//! 3. dest exists and differs: ask the [`DiffOracle`] about the source
//!    - member → `CopyChanged`
//!    - otherwise one of the `Reject*` variants, dest left alone

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;

use crate::error::{io_err, SyncError};
use crate::oracle::{DiffOracle, Membership};
use crate::substitute::Stamps;
use crate::writer;

/// Outcome for one file pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyDecision {
    Skip,
    CopyNew,
    CopyChanged,
    RejectNotInDiff,
    RejectNoRepo,
    RejectNoDiffArtifact,
    RejectUnknown,
}

impl CopyDecision {
    /// Stable machine-readable key.
    pub fn key(&self) -> &'static str {
        match self {
            CopyDecision::Skip => "skip",
            CopyDecision::CopyNew => "copy_new",
            CopyDecision::CopyChanged => "copy_changed",
            CopyDecision::RejectNotInDiff => "reject_not_in_diff",
            CopyDecision::RejectNoRepo => "reject_no_repo",
            CopyDecision::RejectNoDiffArtifact => "reject_no_diff_artifact",
            CopyDecision::RejectUnknown => "reject_unknown",
        }
    }

    /// Operator-facing explanation.
    pub fn reason(&self) -> &'static str {
        match self {
            CopyDecision::Skip => "already up to date",
            CopyDecision::CopyNew => "installed (destination did not exist)",
            CopyDecision::CopyChanged => "updated (file has changed in the PR)",
            CopyDecision::RejectNotInDiff => {
                "left untouched: destination differs and the file has not changed in the PR"
            }
            CopyDecision::RejectNoRepo => {
                "left untouched: source is not inside a git repository, PR membership unknown"
            }
            CopyDecision::RejectNoDiffArtifact => {
                "left untouched: destination differs and no PR diff was provided"
            }
            CopyDecision::RejectUnknown => {
                "left untouched: PR membership could not be determined"
            }
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, CopyDecision::CopyNew | CopyDecision::CopyChanged)
    }

    pub fn is_reject(&self) -> bool {
        matches!(
            self,
            CopyDecision::RejectNotInDiff
                | CopyDecision::RejectNoRepo
                | CopyDecision::RejectNoDiffArtifact
                | CopyDecision::RejectUnknown
        )
    }

    /// Map an oracle answer for a differing destination onto a decision.
    fn from_membership(membership: Membership) -> Self {
        match membership {
            Membership::Member => CopyDecision::CopyChanged,
            Membership::NotMember => CopyDecision::RejectNotInDiff,
            Membership::NoRepo => CopyDecision::RejectNoRepo,
            Membership::NoArtifact => CopyDecision::RejectNoDiffArtifact,
            Membership::MissingPath => CopyDecision::RejectUnknown,
        }
    }
}

impl fmt::Display for CopyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

// ---------------------------------------------------------------------------
// CopyEngine
// ---------------------------------------------------------------------------

/// Applies the copy policy to file pairs.
#[derive(Debug)]
pub struct CopyEngine {
    oracle: DiffOracle,
    stamps: Stamps,
    dry_run: bool,
}

impl CopyEngine {
    pub fn new(oracle: DiffOracle) -> Self {
        Self {
            oracle,
            stamps: Stamps::default(),
            dry_run: false,
        }
    }

    /// Treat a destination equal to its stamped source as up to date.
    pub fn with_stamps(mut self, stamps: Stamps) -> Self {
        self.stamps = stamps;
        self
    }

    /// Decide only; never touch the destination.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn oracle(&self) -> &DiffOracle {
        &self.oracle
    }

    /// Decide what to do with `dest` given `source`, and do it.
    ///
    /// Rejects are `Ok`; only I/O failures are `Err`.
    pub fn decide_and_apply(&self, source: &Path, dest: &Path) -> Result<CopyDecision, SyncError> {
        let source_meta = fs::metadata(source).map_err(|e| io_err(source, e))?;
        let content = fs::read(source).map_err(|e| io_err(source, e))?;

        let dest_meta = match fs::metadata(dest) {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(io_err(dest, e)),
        };

        let Some(dest_meta) = dest_meta else {
            if !self.dry_run {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                }
                writer::replace_atomic(dest, &content, writer::new_file_permissions(&source_meta))?;
                tracing::info!("installed: {}", dest.display());
            }
            return Ok(CopyDecision::CopyNew);
        };

        if same_content(dest, &dest_meta, &content)? {
            tracing::debug!("unchanged: {}", dest.display());
            return Ok(CopyDecision::Skip);
        }
        if let Some(stamped) = self.stamps.stamped(dest, &content) {
            if same_content(dest, &dest_meta, &stamped)? {
                tracing::debug!("unchanged after stamping: {}", dest.display());
                return Ok(CopyDecision::Skip);
            }
        }

        let decision = CopyDecision::from_membership(self.oracle.membership(source));
        if decision == CopyDecision::CopyChanged {
            if !self.dry_run {
                writer::replace_atomic(dest, &content, dest_meta.permissions())?;
                tracing::info!("updated: {}", dest.display());
            }
        } else {
            tracing::warn!("{}: {}", dest.display(), decision.reason());
        }
        Ok(decision)
    }
}

fn same_content(dest: &Path, dest_meta: &fs::Metadata, content: &[u8]) -> Result<bool, SyncError> {
    if dest_meta.len() != content.len() as u64 {
        return Ok(false);
    }
    let existing = fs::read(dest).map_err(|e| io_err(dest, e))?;
    Ok(existing == content)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
