//! Deployment manifest.
//!
//! # File layout
//!
//! ```yaml
//! groups:
//!   - source: init            # relative to the source root
//!     target: init            # relative to the install prefix
//!     files:
//!       - eessi_defaults
//!       - bash
//! substitutions:
//!   - file: init/eessi_defaults
//!     pattern: "__EESSI_VERSION_DEFAULT__"
//!     replace: "{{ version }}"
//! ```
//!
//! Groups and their files are processed in file order. Every path is a
//! [`RelPath`], so validation of the path shape happens during
//! deserialization; [`load`] adds the structural checks on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::types::RelPath;

/// One (source dir, target dir) pair and the files copied between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub source: RelPath,
    pub target: RelPath,
    pub files: Vec<RelPath>,
}

/// A placeholder rewrite applied to an installed file after copying.
///
/// `replace` is a template rendered against the run's version and prefix
/// before it is used as the regex replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionSpec {
    pub file: RelPath,
    pub pattern: String,
    pub replace: String,
}

/// Root of the YAML manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub substitutions: Vec<SubstitutionSpec>,
}

impl Manifest {
    /// Total number of file entries across all groups.
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }
}

/// Load and validate the manifest at `path`.
///
/// Returns `ManifestError::ManifestNotFound` if absent,
/// `ManifestError::Parse` (with path + line context) if malformed YAML.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&contents, path)
}

/// Parse and validate manifest YAML. `origin` is only used for error context.
pub fn parse(contents: &str, origin: &Path) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = serde_yaml::from_str(contents).map_err(|e| ManifestError::Parse {
        path: origin.to_path_buf(),
        source: e,
    })?;
    validate(&manifest)?;
    Ok(manifest)
}

fn validate(manifest: &Manifest) -> Result<(), ManifestError> {
    for (index, group) in manifest.groups.iter().enumerate() {
        if group.files.is_empty() {
            return Err(ManifestError::EmptyGroup {
                index,
                source_dir: PathBuf::from(group.source.as_path()),
                target_dir: PathBuf::from(group.target.as_path()),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
