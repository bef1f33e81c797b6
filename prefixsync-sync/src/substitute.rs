//! Placeholder substitution on installed files.
//!
//! A [`SubstitutionRule`] works like `sed 's/pattern/replacement/g'`: the
//! pattern is matched against each line separately (the line terminator is
//! not part of the line) and every match is replaced. Files are handled as
//! bytes, so non-UTF-8 content passes through untouched.
//!
//! [`apply_substitution`] writes only when the result differs from what is
//! on disk, so re-running with the same version is free.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::bytes::{NoExpand, Regex};
use serde::Serialize;

use prefixsync_core::{Manifest, SubstitutionSpec, SyncConfig};

use crate::error::{io_err, SyncError};
use crate::writer;

/// Outcome of one substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Content changed and was written back.
    Rewritten,
    /// Substitution produced identical content; nothing was written.
    Unchanged,
    /// `--dry-run`: content *would* have changed.
    WouldRewrite,
}

/// A compiled pattern → replacement rule.
#[derive(Debug, Clone)]
pub struct SubstitutionRule {
    pattern: Regex,
    replacement: Vec<u8>,
    expand: bool,
}

impl SubstitutionRule {
    /// Regex rule. `$1` / `${name}` in `replacement` refer to capture groups.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, SyncError> {
        let compiled = Regex::new(pattern).map_err(|e| SyncError::Transform {
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into().into_bytes(),
            expand: true,
        })
    }

    /// Rule that replaces the exact text `needle` with `replacement`, verbatim.
    pub fn literal(needle: &str, replacement: impl Into<String>) -> Result<Self, SyncError> {
        let mut rule = Self::new(&regex::escape(needle), replacement)?;
        rule.expand = false;
        Ok(rule)
    }

    /// Build a rule from a manifest entry, rendering its replacement template.
    ///
    /// The template sees `version` and `install_prefix`.
    pub fn from_spec(spec: &SubstitutionSpec, config: &SyncConfig) -> Result<Self, SyncError> {
        let mut ctx = tera::Context::new();
        ctx.insert("version", &config.version.0);
        ctx.insert("install_prefix", &config.install_prefix.display().to_string());
        let replacement =
            tera::Tera::one_off(&spec.replace, &ctx, false).map_err(|e| SyncError::Template {
                file: spec.file.as_path().to_path_buf(),
                source: e,
            })?;
        Self::new(&spec.pattern, replacement)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Transform `content` line by line.
    pub fn apply(&self, content: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(content.len());
        for chunk in content.split_inclusive(|b| *b == b'\n') {
            let (line, terminator) = match chunk.strip_suffix(b"\n") {
                Some(line) => (line, &b"\n"[..]),
                None => (chunk, &b""[..]),
            };
            if self.expand {
                out.extend_from_slice(&self.pattern.replace_all(line, self.replacement.as_slice()));
            } else {
                out.extend_from_slice(
                    &self
                        .pattern
                        .replace_all(line, NoExpand(self.replacement.as_slice())),
                );
            }
            out.extend_from_slice(terminator);
        }
        out
    }
}

/// Substitution rules keyed by the installed file they rewrite.
///
/// Lets the copy engine recognise an installed file that equals its source
/// after stamping, so a rerun neither rejects it nor copies it back.
#[derive(Debug, Clone, Default)]
pub struct Stamps {
    rules: HashMap<PathBuf, Vec<SubstitutionRule>>,
}

impl Stamps {
    /// Rules for every manifest substitution, targeting paths under the prefix.
    ///
    /// Substitutions whose rule cannot be built are left out; the pipeline
    /// reports those when it runs them.
    pub fn from_manifest(manifest: &Manifest, config: &SyncConfig) -> Self {
        let mut stamps = Self::default();
        for spec in &manifest.substitutions {
            match SubstitutionRule::from_spec(spec, config) {
                Ok(rule) => stamps.insert(spec.file.under(&config.install_prefix), rule),
                Err(e) => tracing::debug!("no stamp for {}: {e}", spec.file),
            }
        }
        stamps
    }

    /// Add `rule` for `dest`. Rules for one file apply in insertion order.
    pub fn insert(&mut self, dest: PathBuf, rule: SubstitutionRule) {
        self.rules.entry(dest).or_default().push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `content` with every rule for `dest` applied, or `None` if it has none.
    pub fn stamped(&self, dest: &Path, content: &[u8]) -> Option<Vec<u8>> {
        let rules = self.rules.get(dest)?;
        Some(
            rules
                .iter()
                .fold(content.to_vec(), |acc, rule| rule.apply(&acc)),
        )
    }
}

/// Apply `rule` to the file at `path` in place.
///
/// The file must exist. Nothing is written when the transformed content
/// equals the current content; otherwise the file is replaced atomically
/// with its permission bits preserved.
pub fn apply_substitution(
    rule: &SubstitutionRule,
    path: &Path,
    dry_run: bool,
) -> Result<UpdateOutcome, SyncError> {
    let meta = fs::metadata(path).map_err(|e| io_err(path, e))?;
    let current = fs::read(path).map_err(|e| io_err(path, e))?;
    let transformed = rule.apply(&current);

    if transformed == current {
        tracing::debug!("substitution no-op: {} ({})", path.display(), rule.pattern());
        return Ok(UpdateOutcome::Unchanged);
    }

    if dry_run {
        tracing::info!("[dry-run] would rewrite: {}", path.display());
        return Ok(UpdateOutcome::WouldRewrite);
    }

    writer::replace_atomic(path, &transformed, meta.permissions())?;
    tracing::info!("rewrote: {} ({})", path.display(), rule.pattern());
    Ok(UpdateOutcome::Rewritten)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use prefixsync_core::RelPath;
    use rstest::rstest;
    use tempfile::TempDir;

    fn file_with(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eessi_defaults");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn replaces_every_occurrence_once_then_noop() {
        let (_dir, path) = file_with("export A=__VERSION__\nexport B=__VERSION__\n");
        let rule = SubstitutionRule::new("__VERSION__", "2025.06").unwrap();

        let first = apply_substitution(&rule, &path, false).unwrap();
        assert_eq!(first, UpdateOutcome::Rewritten);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "export A=2025.06\nexport B=2025.06\n"
        );

        let second = apply_substitution(&rule, &path, false).unwrap();
        assert_eq!(second, UpdateOutcome::Unchanged);
    }

    #[test]
    fn absent_pattern_is_a_noop_without_temporaries() {
        let (dir, path) = file_with("nothing to see\n");
        let mtime_before = fs::metadata(&path).unwrap().modified().unwrap();
        let rule = SubstitutionRule::new("__VERSION__", "2025.06").unwrap();

        assert_eq!(
            apply_substitution(&rule, &path, false).unwrap(),
            UpdateOutcome::Unchanged
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "nothing to see\n");
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime_before);
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "no temporary may persist");
    }

    #[test]
    fn inverse_rule_restores_original_bytes() {
        let original = "line one __VERSION__\r\nsecond\n__VERSION__ tail";
        let (_dir, path) = file_with(original);

        let forward = SubstitutionRule::literal("__VERSION__", "2025.06").unwrap();
        let inverse = SubstitutionRule::literal("2025.06", "__VERSION__").unwrap();
        apply_substitution(&forward, &path, false).unwrap();
        assert_ne!(fs::read_to_string(&path).unwrap(), original);
        apply_substitution(&inverse, &path, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn pattern_cannot_span_lines() {
        let rule = SubstitutionRule::new("a\nb", "X").unwrap();
        assert_eq!(rule.apply(b"a\nb\n"), b"a\nb\n".to_vec());
        let anchored = SubstitutionRule::new("^v=.*$", "v=new").unwrap();
        assert_eq!(anchored.apply(b"v=1\nv=2"), b"v=new\nv=new".to_vec());
    }

    #[rstest]
    #[case("(__VER)(SION__)", "$2$1", "x __VERSION__", "x SION____VER")]
    #[case("(a)", "${1}x", "a-a", "ax-ax")]
    fn regex_rules_expand_groups(
        #[case] pattern: &str,
        #[case] replacement: &str,
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        let rule = SubstitutionRule::new(pattern, replacement).unwrap();
        assert_eq!(rule.apply(input.as_bytes()), expected.as_bytes().to_vec());
    }

    #[test]
    fn literal_rule_does_not_expand_dollars() {
        let rule = SubstitutionRule::literal("__X__", "$1").unwrap();
        assert_eq!(rule.apply(b"__X__"), b"$1".to_vec());
    }

    #[test]
    fn invalid_pattern_is_a_transform_error() {
        let err = SubstitutionRule::new("(unclosed", "x").unwrap_err();
        assert!(matches!(err, SyncError::Transform { .. }), "got: {err}");
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let rule = SubstitutionRule::new("a", "b").unwrap();
        let err = apply_substitution(&rule, &dir.path().join("missing"), false).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let (_dir, path) = file_with("__VERSION__\n");
        let rule = SubstitutionRule::new("__VERSION__", "2025.06").unwrap();
        assert_eq!(
            apply_substitution(&rule, &path, true).unwrap(),
            UpdateOutcome::WouldRewrite
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "__VERSION__\n");
    }

    #[test]
    #[cfg(unix)]
    fn rewrite_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = file_with("__VERSION__\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o754)).unwrap();
        let rule = SubstitutionRule::new("__VERSION__", "2025.06").unwrap();
        apply_substitution(&rule, &path, false).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o754);
    }

    #[test]
    fn non_utf8_content_passes_through() {
        let rule = SubstitutionRule::new("__V__", "1").unwrap();
        let input = [0xff, 0xfe, b'_', b'_', b'V', b'_', b'_', b'\n'];
        assert_eq!(rule.apply(&input), vec![0xff, 0xfe, b'1', b'\n']);
    }

    #[test]
    fn spec_replacement_is_rendered_from_config() {
        let spec = SubstitutionSpec {
            file: RelPath::new("init/eessi_defaults").unwrap(),
            pattern: "__EESSI_VERSION_DEFAULT__".to_string(),
            replace: "{{ version }}".to_string(),
        };
        let config = SyncConfig::new("/cvmfs/prefix", "2023.06", ".");
        let rule = SubstitutionRule::from_spec(&spec, &config).unwrap();
        assert_eq!(
            rule.apply(b"EESSI_VERSION_DEFAULT=__EESSI_VERSION_DEFAULT__\n"),
            b"EESSI_VERSION_DEFAULT=2023.06\n".to_vec()
        );
    }

    #[test]
    fn broken_template_is_a_template_error() {
        let spec = SubstitutionSpec {
            file: RelPath::new("init/eessi_defaults").unwrap(),
            pattern: "x".to_string(),
            replace: "{{ version".to_string(),
        };
        let config = SyncConfig::new("/p", "2023.06", ".");
        let err = SubstitutionRule::from_spec(&spec, &config).unwrap_err();
        assert!(matches!(err, SyncError::Template { .. }), "got: {err}");
    }

    #[test]
    fn stamps_apply_manifest_rules_per_destination() {
        let manifest = prefixsync_core::manifest::parse(
            r#"
groups:
  - source: init
    target: init
    files: [eessi_defaults]
substitutions:
  - file: init/eessi_defaults
    pattern: "__V__"
    replace: "{{ version }}"
  - file: init/eessi_defaults
    pattern: "__P__"
    replace: "{{ install_prefix }}"
"#,
            Path::new("m.yaml"),
        )
        .unwrap();
        let config = SyncConfig::new("/cvmfs/p", "2023.06", ".");
        let stamps = Stamps::from_manifest(&manifest, &config);

        let dest = Path::new("/cvmfs/p").join("init").join("eessi_defaults");
        assert_eq!(
            stamps.stamped(&dest, b"V=__V__ P=__P__\n"),
            Some(b"V=2023.06 P=/cvmfs/p\n".to_vec())
        );
        assert_eq!(stamps.stamped(Path::new("/cvmfs/p/init/bash"), b"x"), None);
    }

    #[test]
    fn unbuildable_rule_is_left_out_of_stamps() {
        let mut manifest = Manifest::default();
        manifest.substitutions.push(SubstitutionSpec {
            file: RelPath::new("init/eessi_defaults").unwrap(),
            pattern: "(unclosed".to_string(),
            replace: "x".to_string(),
        });
        let config = SyncConfig::new("/p", "2023.06", ".");
        assert!(Stamps::from_manifest(&manifest, &config).is_empty());
    }
}
