//! Error types for prefixsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use prefixsync_core::ManifestError;

/// All errors that can arise from sync operations.
///
/// Reject outcomes (not in diff, no repository, no diff artifact) are not
/// errors; they are [`crate::CopyDecision`] variants.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from manifest loading.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A substitution pattern that does not compile.
    #[error("invalid substitution pattern '{pattern}': {source}")]
    Transform {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A substitution replacement template that does not render.
    #[error("failed to render replacement for {file}: {source}")]
    Template {
        file: PathBuf,
        #[source]
        source: tera::Error,
    },

    /// JSON serialization error (run reports).
    #[error("report JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
