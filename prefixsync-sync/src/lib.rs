//! # prefixsync-sync
//!
//! Policy-gated deployment of source files into an installation prefix.
//!
//! Call [`pipeline::run`] to deploy a whole manifest, [`sync_list`] to
//! deploy a single file list, or [`apply_substitution`] to rewrite a
//! placeholder in an installed file.

pub mod batch;
pub mod decision;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod preview;
pub mod substitute;
pub mod writer;

pub use batch::{sync_list, BatchReport, EntryOutcome, EntryReport};
pub use decision::{CopyDecision, CopyEngine};
pub use error::SyncError;
pub use oracle::{DiffOracle, DotGitMarker, GitToplevel, Membership, RepoLocator};
pub use pipeline::{RunReport, SubstitutionOutcome, SubstitutionReport};
pub use preview::{diff_manifest, FileDiff};
pub use substitute::{apply_substitution, Stamps, SubstitutionRule, UpdateOutcome};
