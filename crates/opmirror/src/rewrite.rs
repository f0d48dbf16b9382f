//! Import rewriting inside a mirror tree
//!
//! Points internal imports at the mirror module instead of the upstream one.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::closure::internal_suffix;
use crate::error::MirrorError;
use crate::fsutil;
use crate::scan::{self, ParseError};

/// How module references are located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteMode {
    /// Only import-path literals of import declarations
    #[default]
    Imports,
    /// Every occurrence of `<module>/` anywhere in the file
    Textual,
}

impl FromStr for RewriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imports" => Ok(RewriteMode::Imports),
            "textual" => Ok(RewriteMode::Textual),
            other => Err(format!(
                "unknown rewrite mode `{}` (expected `imports` or `textual`)",
                other
            )),
        }
    }
}

impl fmt::Display for RewriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteMode::Imports => f.write_str("imports"),
            RewriteMode::Textual => f.write_str("textual"),
        }
    }
}

/// Rewrites references from one module to another
#[derive(Debug, Clone)]
pub struct ImportRewriter {
    from_module: String,
    to_module: String,
    mode: RewriteMode,
}

impl ImportRewriter {
    pub fn new(from_module: &str, to_module: &str, mode: RewriteMode) -> Self {
        Self {
            from_module: from_module.to_string(),
            to_module: to_module.to_string(),
            mode,
        }
    }

    /// Rewrite one source text; `None` when nothing changes.
    ///
    /// `origin` only names the file in parse errors.
    pub fn rewrite_source(&self, src: &str, origin: &Path) -> Result<Option<String>, MirrorError> {
        let rewritten = match self.mode {
            RewriteMode::Imports => self.rewrite_import_literals(src, origin)?,
            RewriteMode::Textual => {
                let old_prefix = format!("{}/", self.from_module);
                let new_prefix = format!("{}/", self.to_module);
                src.contains(&old_prefix)
                    .then(|| src.replace(&old_prefix, &new_prefix))
            }
        };
        Ok(rewritten.filter(|out| out != src))
    }

    fn rewrite_import_literals(
        &self,
        src: &str,
        origin: &Path,
    ) -> Result<Option<String>, MirrorError> {
        let specs = scan::parse_imports(src).map_err(|e| ParseError {
            path: origin.to_path_buf(),
            line: e.line,
            message: e.message,
        })?;

        let mut out = String::with_capacity(src.len());
        let mut cursor = 0;
        let mut changed = false;
        for spec in &specs {
            let Some(suffix) = internal_suffix(&spec.path, &self.from_module) else {
                continue;
            };
            out.push_str(&src[cursor..spec.span.start]);
            out.push_str(&spec.literal_for(&format!("{}/{}", self.to_module, suffix)));
            cursor = spec.span.end;
            changed = true;
        }

        if !changed {
            return Ok(None);
        }
        out.push_str(&src[cursor..]);
        Ok(Some(out))
    }

    /// Rewrite a file in place, keeping its permissions. Returns whether it changed.
    pub fn rewrite_file(&self, path: &Path) -> Result<bool, MirrorError> {
        let src = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
        let Some(out) = self.rewrite_source(&src, path)? else {
            return Ok(false);
        };
        let perms = fs::metadata(path)
            .map_err(|e| MirrorError::io(path, e))?
            .permissions();
        fsutil::write_atomic(path, out.as_bytes(), Some(perms))?;
        Ok(true)
    }

    /// Rewrite every Go source under `root`; returns the files changed.
    pub fn rewrite_tree(&self, root: &Path) -> Result<Vec<PathBuf>, MirrorError> {
        let mut changed = Vec::new();
        for file in fsutil::go_files_in_tree(root)? {
            if self.rewrite_file(&file)? {
                changed.push(file);
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"package v1

import (
	"fmt"
	w "example.com/up/internal/widgets"
	`example.com/up/internal/raw`
	"example.com/upstream/other"
	"example.com/up"
)

// See example.com/up/internal/widgets for details.
var doc = "example.com/up/internal/widgets"
"#;

    fn rewriter(mode: RewriteMode) -> ImportRewriter {
        ImportRewriter::new("example.com/up", "example.com/mirror/widgets", mode)
    }

    #[test]
    fn test_imports_mode_touches_only_import_literals() {
        let out = rewriter(RewriteMode::Imports)
            .rewrite_source(SRC, Path::new("x.go"))
            .unwrap()
            .unwrap();

        assert!(out.contains("w \"example.com/mirror/widgets/internal/widgets\""));
        assert!(out.contains("`example.com/mirror/widgets/internal/raw`"));
        assert!(out.contains("\"example.com/upstream/other\""));
        assert!(out.contains("\t\"example.com/up\"\n"));
        assert!(out.contains("// See example.com/up/internal/widgets for details."));
        assert!(out.contains("var doc = \"example.com/up/internal/widgets\""));
    }

    #[test]
    fn test_textual_mode_replaces_everywhere() {
        let out = rewriter(RewriteMode::Textual)
            .rewrite_source(SRC, Path::new("x.go"))
            .unwrap()
            .unwrap();

        assert!(!out.contains("example.com/up/"));
        assert!(out.contains("// See example.com/mirror/widgets/internal/widgets"));
        assert!(out.contains("\"example.com/upstream/other\""));
    }

    #[test]
    fn test_unchanged_source_returns_none() {
        let src = "package a\n\nimport \"fmt\"\n";
        for mode in [RewriteMode::Imports, RewriteMode::Textual] {
            assert_eq!(rewriter(mode).rewrite_source(src, Path::new("a.go")).unwrap(), None);
        }
    }

    #[test]
    fn test_rewrite_tree_skips_untouched_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        let b = dir.path().join("sub/b.go");
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, "package a\nimport \"example.com/up/internal/x\"\n").unwrap();
        fs::write(&b, "package b\nimport \"fmt\"\n").unwrap();
        let before = fs::metadata(&b).unwrap().modified().unwrap();

        let changed = rewriter(RewriteMode::Imports).rewrite_tree(dir.path()).unwrap();

        assert_eq!(changed, vec![a.clone()]);
        assert_eq!(
            fs::read_to_string(&a).unwrap(),
            "package a\nimport \"example.com/mirror/widgets/internal/x\"\n"
        );
        assert_eq!(fs::metadata(&b).unwrap().modified().unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gen.go");
        fs::write(&file, "package gen\nimport \"example.com/up/internal/x\"\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).unwrap();

        assert!(rewriter(RewriteMode::Imports).rewrite_file(&file).unwrap());
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_parse_mode_round_trip() {
        assert_eq!("imports".parse::<RewriteMode>().unwrap(), RewriteMode::Imports);
        assert_eq!("textual".parse::<RewriteMode>().unwrap(), RewriteMode::Textual);
        assert!("ast".parse::<RewriteMode>().is_err());
        assert_eq!(RewriteMode::default().to_string(), "imports");
    }
}
