//! Dependency closure over internal packages
//!
//! Decides which upstream packages the mirrored API surface needs and copies
//! them into the mirror. Resolution is a worklist over import paths: every
//! package copied is rescanned, so packages reached only through other
//! internal packages are found as well.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MirrorError;
use crate::fsutil;
use crate::scan;

/// Suffix of `import` below `module`, if the import is internal to it.
///
/// `example.com/up/internal/a` has suffix `internal/a` in `example.com/up`;
/// the module's root package and foreign paths have none.
pub fn internal_suffix<'i>(import: &'i str, module: &str) -> Option<&'i str> {
    import
        .strip_prefix(module)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|suffix| !suffix.is_empty())
}

/// Internal import paths among `imports`, deduplicated and sorted
pub fn internal_imports<I>(imports: I, module: &str) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    imports
        .into_iter()
        .filter(|import| internal_suffix(import.as_ref(), module).is_some())
        .map(|import| import.as_ref().to_string())
        .collect()
}

/// An internal package materialized in the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Import path in the upstream module
    pub import: String,

    /// Directory of the package relative to the module root, `/`-separated
    pub rel_path: String,

    /// Source files copied for the package
    pub files: usize,
}

/// Copies internal packages from an upstream checkout into a mirror tree
pub struct ClosureResolver<'a> {
    upstream_module: &'a str,
    upstream_root: &'a Path,
    mirror_root: &'a Path,
}

impl<'a> ClosureResolver<'a> {
    /// Create a resolver for one upstream module and one mirror directory
    pub fn new(upstream_module: &'a str, upstream_root: &'a Path, mirror_root: &'a Path) -> Self {
        Self {
            upstream_module,
            upstream_root,
            mirror_root,
        }
    }

    fn missing(&self, import: &str, dir: PathBuf) -> MirrorError {
        MirrorError::MissingPackage {
            import: import.to_string(),
            dir,
        }
    }

    /// Copy the package behind one internal import path.
    ///
    /// The import path maps directly onto a directory below the upstream
    /// root; that directory must exist. Returns the files written.
    pub fn copy_package(&self, import: &str) -> Result<Vec<PathBuf>, MirrorError> {
        let suffix = internal_suffix(import, self.upstream_module)
            .ok_or_else(|| self.missing(import, self.upstream_root.to_path_buf()))?;

        let mut src = self.upstream_root.to_path_buf();
        let mut dst = self.mirror_root.to_path_buf();
        for segment in suffix.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(self.missing(import, self.upstream_root.join(suffix)));
            }
            src.push(segment);
            dst.push(segment);
        }

        match fs::metadata(&src) {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(self.missing(import, src)),
        }

        fsutil::copy_package(&src, &dst)
    }

    /// Copy every internal package reachable from `seed_files`.
    ///
    /// `seed_files` are the API surface files already copied into the mirror.
    /// Each package is processed at most once; the result is sorted by import path.
    pub fn resolve(&self, seed_files: &[PathBuf]) -> Result<Vec<ResolvedPackage>, MirrorError> {
        let seed = scan::scan_imports_in_files(seed_files)?;
        let mut pending = internal_imports(&seed, self.upstream_module);
        let mut processed = BTreeSet::new();
        let mut resolved = Vec::new();

        while let Some(import) = pending.pop_first() {
            processed.insert(import.clone());

            let written = self.copy_package(&import)?;
            let found = scan::scan_imports_in_files(&written)?;
            for next in internal_imports(&found, self.upstream_module) {
                if !processed.contains(&next) {
                    pending.insert(next);
                }
            }

            let rel_path = internal_suffix(&import, self.upstream_module)
                .unwrap_or_default()
                .to_string();
            resolved.push(ResolvedPackage {
                import,
                rel_path,
                files: written.len(),
            });
        }

        resolved.sort_by(|a, b| a.import.cmp(&b.import));
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const UP: &str = "example.com/up";

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_internal_suffix() {
        assert_eq!(internal_suffix("example.com/up/internal/a", UP), Some("internal/a"));
        assert_eq!(internal_suffix("example.com/up", UP), None);
        assert_eq!(internal_suffix("example.com/up/", UP), None);
        assert_eq!(internal_suffix("example.com/upstream/x", UP), None);
        assert_eq!(internal_suffix("k8s.io/api/core/v1", UP), None);
    }

    #[test]
    fn test_internal_imports_dedup_and_sort() {
        let found = internal_imports(
            [
                "example.com/up/internal/b",
                "fmt",
                "example.com/up/internal/a",
                "example.com/up/internal/b",
                "example.com/upx/internal/c",
            ],
            UP,
        );
        let found: Vec<_> = found.into_iter().collect();
        assert_eq!(found, vec!["example.com/up/internal/a", "example.com/up/internal/b"]);
    }

    #[test]
    fn test_resolve_follows_transitive_imports() {
        let upstream = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        write(
            upstream.path(),
            "internal/a/a.go",
            "package a\nimport \"example.com/up/internal/b\"\n",
        );
        write(
            upstream.path(),
            "internal/b/b.go",
            "package b\nimport (\"fmt\"; \"example.com/up/internal/c\")\n",
        );
        write(upstream.path(), "internal/c/c.go", "package c\n");
        write(upstream.path(), "internal/unused/u.go", "package unused\n");
        write(
            mirror.path(),
            "api/v1/types.go",
            "package v1\nimport \"example.com/up/internal/a\"\n",
        );

        let resolver = ClosureResolver::new(UP, upstream.path(), mirror.path());
        let resolved = resolver
            .resolve(&[mirror.path().join("api/v1/types.go")])
            .unwrap();

        let rels: Vec<_> = resolved.iter().map(|p| p.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["internal/a", "internal/b", "internal/c"]);
        assert!(mirror.path().join("internal/c/c.go").exists());
        assert!(!mirror.path().join("internal/unused").exists());
    }

    #[test]
    fn test_resolve_handles_import_cycles() {
        let upstream = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        write(
            upstream.path(),
            "internal/a/a.go",
            "package a\nimport \"example.com/up/internal/b\"\n",
        );
        write(
            upstream.path(),
            "internal/b/b.go",
            "package b\nimport \"example.com/up/internal/a\"\n",
        );
        write(
            mirror.path(),
            "api/x.go",
            "package api\nimport \"example.com/up/internal/a\"\n",
        );

        let resolver = ClosureResolver::new(UP, upstream.path(), mirror.path());
        let resolved = resolver.resolve(&[mirror.path().join("api/x.go")]).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_missing_package_dir() {
        let upstream = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();

        let resolver = ClosureResolver::new(UP, upstream.path(), mirror.path());
        let err = resolver.copy_package("example.com/up/internal/gone").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.to_string().contains("example.com/up/internal/gone"));
        assert!(!mirror.path().join("internal").exists());
    }

    #[test]
    fn test_package_path_that_is_a_file() {
        let upstream = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        write(upstream.path(), "internal/flat", "not a dir");

        let resolver = ClosureResolver::new(UP, upstream.path(), mirror.path());
        let err = resolver.copy_package("example.com/up/internal/flat").unwrap_err();
        assert!(matches!(err, MirrorError::MissingPackage { .. }));
    }

    #[test]
    fn test_rejects_parent_segments() {
        let upstream = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();

        let resolver = ClosureResolver::new(UP, upstream.path(), mirror.path());
        let err = resolver.copy_package("example.com/up/../escape").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }
}
