//! Atomic file replacement.
//!
//! ## `replace_atomic` protocol
//!
//! 1. Create `.<name>.XXXXXX.prefixsync.tmp` in the target's own directory
//!    (same filesystem, so the final rename never crosses devices).
//! 2. Write the new content and flush it to disk.
//! 3. Apply the permission bits the target should end up with.
//! 4. Rename over the target (atomic on POSIX).
//!
//! The temporary is owned by a [`NamedTempFile`]; any early return drops it,
//! which deletes it. Readers see either the old file or the new one, never a
//! truncated mix.
//!
//! A target that is a symlink is resolved first, so the link survives and
//! the file it points at is replaced. A dangling link is an error.

use std::fs::{self, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::error::{io_err, SyncError};

/// Suffix shared by every temporary this crate creates.
pub const TMP_SUFFIX: &str = ".prefixsync.tmp";

/// Atomically replace (or create) `path` with `content`, ending with `permissions`.
pub fn replace_atomic(
    path: &Path,
    content: &[u8],
    permissions: Permissions,
) -> Result<(), SyncError> {
    let target = resolve_link(path)?;
    let path = target.as_path();
    let dir = parent_dir(path);
    let mut tmp = stage(path, dir)?;

    tmp.write_all(content).map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_err(tmp.path(), e))?;
    fs::set_permissions(tmp.path(), permissions).map_err(|e| io_err(tmp.path(), e))?;

    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}

/// Permissions for a file that does not exist yet, derived from its source.
///
/// World-readable, never group/other-writable, source execute bits kept:
/// the outcome of copying under `umask 022` with read access forced on.
#[cfg(unix)]
pub fn new_file_permissions(source: &fs::Metadata) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    let mode = (source.permissions().mode() | 0o444) & 0o755;
    Permissions::from_mode(mode)
}

#[cfg(not(unix))]
pub fn new_file_permissions(source: &fs::Metadata) -> Permissions {
    let mut perms = source.permissions();
    perms.set_readonly(false);
    perms
}

fn resolve_link(path: &Path) -> Result<PathBuf, SyncError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::canonicalize(path).map_err(|e| io_err(path, e))
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn stage(path: &Path, dir: &Path) -> Result<NamedTempFile, SyncError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| io_err(dir, e))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
