//! Error types for prefixsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Underlying I/O failure while reading the manifest.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest file did not exist at the given path.
    #[error("manifest not found at {path}")]
    ManifestNotFound { path: PathBuf },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A path in the manifest escapes its root or is otherwise unusable.
    #[error("invalid relative path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A group lists no files.
    #[error("group #{index} ({source_dir} -> {target_dir}) lists no files")]
    EmptyGroup {
        index: usize,
        source_dir: PathBuf,
        target_dir: PathBuf,
    },
}
