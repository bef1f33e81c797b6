//! Diff membership oracle.
//!
//! Answers one question: was this file touched by the change set under
//! review? The review artifact is a unified diff; a file counts as touched
//! when `b/<path relative to its repository root>` occurs anywhere in the
//! artifact text.
//!
//! The check is a literal substring test, not a structural diff parse. A path
//! that is a suffix of another touched path (`b/init/bash` inside
//! `b/init/bash_completion`) is reported as a member.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

/// Prefix git puts in front of the post-change side of a two-sided diff.
pub const NEW_SIDE_MARKER: &str = "b/";

/// Result of a membership query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The path appears on the new side of the artifact.
    Member,
    /// Repository and artifact are both available, but the path is absent.
    NotMember,
    /// The path is not inside a version-controlled tree.
    NoRepo,
    /// No artifact is configured, or it could not be read.
    NoArtifact,
    /// The queried path does not exist.
    MissingPath,
}

// ---------------------------------------------------------------------------
// Repository root lookup
// ---------------------------------------------------------------------------

/// Finds the root of the repository that contains a directory.
pub trait RepoLocator: fmt::Debug + Send + Sync {
    /// Repository root for `dir`, or `None` if `dir` is not tracked.
    fn toplevel(&self, dir: &Path) -> Option<PathBuf>;
}

/// Asks git: `git rev-parse --show-toplevel`, run inside the directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitToplevel;

impl RepoLocator for GitToplevel {
    fn toplevel(&self, dir: &Path) -> Option<PathBuf> {
        let output = match Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("git unavailable in {}: {e}", dir.display());
                return None;
            }
        };
        if !output.status.success() {
            tracing::debug!(
                "not a git repository: {} ({})",
                dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            None
        } else {
            Some(PathBuf::from(root))
        }
    }
}

/// Walks up from the directory looking for a `.git` entry.
///
/// Needs no git binary; a `.git` file (worktrees, submodules) counts too.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotGitMarker;

impl RepoLocator for DotGitMarker {
    fn toplevel(&self, dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .find(|candidate| candidate.join(".git").exists())
            .map(Path::to_path_buf)
    }
}

// ---------------------------------------------------------------------------
// DiffOracle
// ---------------------------------------------------------------------------

/// Membership oracle over a single review artifact.
///
/// The artifact is read once, at construction; queries never touch it again
/// and never mutate the oracle, so one instance can serve concurrent callers.
#[derive(Debug)]
pub struct DiffOracle {
    locator: Box<dyn RepoLocator>,
    artifact: Option<String>,
}

impl DiffOracle {
    /// Build an oracle from an artifact reference.
    ///
    /// `None`, an empty path, a missing file and an unreadable file all
    /// result in an oracle that answers [`Membership::NoArtifact`].
    pub fn new(artifact: Option<&Path>, locator: impl RepoLocator + 'static) -> Self {
        let text = artifact
            .filter(|p| !p.as_os_str().is_empty())
            .and_then(read_artifact);
        Self::from_text(text, locator)
    }

    /// Build an oracle over artifact text already in memory.
    pub fn from_text(artifact: Option<String>, locator: impl RepoLocator + 'static) -> Self {
        Self {
            locator: Box::new(locator),
            artifact,
        }
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    /// Classify `path` against the artifact.
    ///
    /// Checks run in a fixed order: existence, repository, artifact, match.
    pub fn membership(&self, path: &Path) -> Membership {
        let Ok(canonical) = std::fs::canonicalize(path) else {
            return Membership::MissingPath;
        };
        let dir = canonical.parent().unwrap_or(canonical.as_path());

        let Some(root) = self.locator.toplevel(dir) else {
            return Membership::NoRepo;
        };
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        let Ok(relative) = canonical.strip_prefix(&root) else {
            return Membership::NoRepo;
        };

        let Some(text) = self.artifact.as_deref() else {
            return Membership::NoArtifact;
        };

        let needle = format!("{NEW_SIDE_MARKER}{}", slash_path(relative));
        if text.contains(&needle) {
            Membership::Member
        } else {
            Membership::NotMember
        }
    }
}

fn read_artifact(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("PR diff not found: {}", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("PR diff unreadable at {}: {e}", path.display());
            None
        }
    }
}

/// Render a relative path with `/` separators, as diff headers spell it.
fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
