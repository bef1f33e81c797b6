//! Domain types for prefixsync.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! [`RelPath`] is validated on construction, so a manifest that loaded
//! successfully can never name a file outside its source or target root.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A path relative to a source root or an installation prefix.
///
/// Rejects empty strings, absolute paths and `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(PathBuf);

impl RelPath {
    /// Validate and wrap a relative path.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ManifestError> {
        let raw = raw.as_ref();
        let invalid = |reason| ManifestError::InvalidPath {
            path: raw.to_owned(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }
        let path = PathBuf::from(raw);
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid("'..' is not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("must be relative"))
                }
            }
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Join onto a root directory.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl AsRef<Path> for RelPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

impl TryFrom<String> for RelPath {
    type Error = ManifestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for RelPath {
    type Error = ManifestError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelPath> for String {
    fn from(p: RelPath) -> Self {
        p.0.to_string_lossy().into_owned()
    }
}

/// The release version stamped into installed files (e.g. `2023.06`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(pub String);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
