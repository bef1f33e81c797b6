//! Unified diff preview for `prefixsync diff`.
//!
//! Shows, for every manifest entry whose installed copy differs from its
//! source, what a sync would change and whether the copy policy would let it.
//! Listing follows the copy engine's byte comparison; the rendered hunks are
//! lossy UTF-8 with CRLF folded to LF.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use prefixsync_core::Manifest;

use crate::decision::{CopyDecision, CopyEngine};
use crate::error::{io_err, SyncError};

/// Shown instead of hunks when the bytes differ but the rendered text does not.
pub const INVISIBLE_CHANGE_NOTE: &str =
    "contents differ only in line endings or non-UTF-8 bytes";

/// A single installed-vs-source diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Destination path relative to the install prefix.
    pub rel_path: PathBuf,
    pub dest: PathBuf,
    /// What `sync` would do with this entry.
    pub decision: CopyDecision,
    /// Empty when the difference does not survive text rendering; see `note`.
    pub unified_diff: String,
    pub note: Option<&'static str>,
}

/// Compare installed files to their sources without writing anything.
///
/// An entry is listed exactly when `sync` would not skip it: both sides
/// exist and the engine's byte comparison (stamps included) finds them
/// different. `engine` is forced into dry-run. Entries whose source or
/// destination is missing are left out: there is nothing installed to
/// protect, or nothing to install.
pub fn diff_manifest(
    source_root: &Path,
    install_prefix: &Path,
    manifest: &Manifest,
    engine: CopyEngine,
) -> Result<Vec<FileDiff>, SyncError> {
    let engine = engine.with_dry_run(true);
    let mut diffs = Vec::new();

    for group in &manifest.groups {
        let source_dir = group.source.under(source_root);
        let dest_dir = group.target.under(install_prefix);
        for file in &group.files {
            let source = file.under(&source_dir);
            let dest = file.under(&dest_dir);
            let (Some(installed), Some(wanted)) = (read_optional(&dest)?, read_optional(&source)?)
            else {
                continue;
            };

            let decision = engine.decide_and_apply(&source, &dest)?;
            if decision == CopyDecision::Skip {
                continue;
            }

            let rel_path = group.target.as_path().join(file.as_path());
            let old_text = render(&installed);
            let new_text = render(&wanted);
            let (unified_diff, note) = if old_text == new_text {
                (String::new(), Some(INVISIBLE_CHANGE_NOTE))
            } else {
                let old_header = format!("a/{}", rel_path.display());
                let new_header = format!("b/{}", rel_path.display());
                let unified = TextDiff::from_lines(&old_text, &new_text)
                    .unified_diff()
                    .header(&old_header, &new_header)
                    .context_radius(3)
                    .to_string();
                (unified, None)
            };

            diffs.push(FileDiff {
                rel_path,
                dest,
                decision,
                unified_diff,
                note,
            });
        }
    }

    Ok(diffs)
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Text used for hunks only: lossy UTF-8, CRLF folded to LF.
fn render(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use prefixsync_core::manifest;
    use tempfile::TempDir;

    use super::*;
    use crate::oracle::{DiffOracle, DotGitMarker};
    use crate::substitute::{Stamps, SubstitutionRule};

    fn setup() -> (TempDir, TempDir, Manifest) {
        let repo = TempDir::new().expect("repo");
        fs::create_dir(repo.path().join(".git")).expect(".git");
        fs::create_dir_all(repo.path().join("init")).expect("mkdir");
        fs::write(repo.path().join("init").join("bash"), "one\ntwo\nthree\n").expect("write");
        fs::write(repo.path().join("init").join("zsh"), "z\n").expect("write");

        let prefix = TempDir::new().expect("prefix");
        let manifest = manifest::parse(
            "groups:\n  - source: init\n    target: init\n    files: [bash, zsh]\n",
            Path::new("m.yaml"),
        )
        .expect("manifest");
        (repo, prefix, manifest)
    }

    fn engine(diff: Option<&str>) -> CopyEngine {
        CopyEngine::new(DiffOracle::from_text(diff.map(str::to_string), DotGitMarker))
    }

    #[test]
    fn nothing_installed_means_no_diffs() {
        let (repo, prefix, manifest) = setup();
        let diffs = diff_manifest(repo.path(), prefix.path(), &manifest, engine(None)).expect("diff");
        assert!(diffs.is_empty());
    }

    #[test]
    fn local_edit_produces_unified_diff_with_decision() {
        let (repo, prefix, manifest) = setup();
        let installed = prefix.path().join("init");
        fs::create_dir_all(&installed).expect("mkdir");
        fs::write(installed.join("bash"), "one\nTWO\nthree\n").expect("write");
        fs::write(installed.join("zsh"), "z\n").expect("write");

        let diffs = diff_manifest(repo.path(), prefix.path(), &manifest, engine(None)).expect("diff");
        assert_eq!(diffs.len(), 1);
        let d = &diffs[0];
        assert_eq!(d.rel_path, PathBuf::from("init").join("bash"));
        assert_eq!(d.decision, CopyDecision::RejectNoDiffArtifact);
        assert!(d.unified_diff.contains("--- a/init/bash"));
        assert!(d.unified_diff.contains("+++ b/init/bash"));
        assert!(d.unified_diff.contains("-TWO"));
        assert!(d.unified_diff.contains("+two"));
        assert_eq!(
            fs::read_to_string(installed.join("bash")).expect("read"),
            "one\nTWO\nthree\n",
            "preview must not write"
        );
    }

    #[test]
    fn line_ending_only_difference_is_listed_with_decision() {
        let (repo, prefix, manifest) = setup();
        let installed = prefix.path().join("init");
        fs::create_dir_all(&installed).expect("mkdir");
        fs::write(installed.join("bash"), "one\r\ntwo\r\nthree\r\n").expect("write");

        let diffs = diff_manifest(
            repo.path(),
            prefix.path(),
            &manifest,
            engine(Some("+++ b/init/bash\n")),
        )
        .expect("diff");
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].decision, CopyDecision::CopyChanged);
        assert_eq!(diffs[0].note, Some(INVISIBLE_CHANGE_NOTE));
        assert!(diffs[0].unified_diff.is_empty());
        assert_eq!(
            fs::read_to_string(installed.join("bash")).expect("read"),
            "one\r\ntwo\r\nthree\r\n",
            "preview must not write"
        );
    }

    #[test]
    fn invalid_utf8_difference_is_listed() {
        let (repo, prefix, manifest) = setup();
        let installed = prefix.path().join("init");
        fs::create_dir_all(&installed).expect("mkdir");
        fs::write(repo.path().join("init").join("zsh"), [0xff, b'\n']).expect("write");
        fs::write(installed.join("zsh"), [0xfe, b'\n']).expect("write");

        let diffs = diff_manifest(repo.path(), prefix.path(), &manifest, engine(None)).expect("diff");
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].decision, CopyDecision::RejectNoDiffArtifact);
        assert_eq!(diffs[0].note, Some(INVISIBLE_CHANGE_NOTE));
    }

    #[test]
    fn stamped_install_is_not_listed() {
        let (repo, prefix, manifest) = setup();
        fs::write(repo.path().join("init").join("zsh"), "V=__V__\n").expect("write");
        let installed = prefix.path().join("init");
        fs::create_dir_all(&installed).expect("mkdir");
        fs::write(installed.join("zsh"), "V=2023.06\n").expect("write");

        let mut stamps = Stamps::default();
        stamps.insert(
            installed.join("zsh"),
            SubstitutionRule::new("__V__", "2023.06").expect("rule"),
        );
        let diffs = diff_manifest(
            repo.path(),
            prefix.path(),
            &manifest,
            engine(None).with_stamps(stamps),
        )
        .expect("diff");
        assert!(diffs.is_empty());
    }
}
