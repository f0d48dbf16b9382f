//! Go module manifest (go.mod) handling
//!
//! Only the `module` and `go` directives are read; requirements are left to
//! the dependency-lock tool.

use std::fs;
use std::path::Path;

use crate::error::MirrorError;
use crate::fsutil;

/// Manifest file name at a module root
pub const MANIFEST_FILE: &str = "go.mod";

/// Identity of a Go module as declared by its manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    /// Module path from the `module` directive
    pub module: String,

    /// Language version from the `go` directive
    pub go_version: Option<String>,
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn directive_value(rest: &str) -> Option<String> {
    let value = rest.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('`').and_then(|v| v.strip_suffix('`')))
        .unwrap_or(value);
    if value.is_empty() || value.contains(char::is_whitespace) {
        None
    } else {
        Some(value.to_string())
    }
}

impl GoModule {
    /// Parse the directives of a manifest.
    ///
    /// `origin` only names the file in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, MirrorError> {
        let mut module = None;
        let mut go_version = None;

        for (lineno, line) in text.lines().enumerate() {
            let line = strip_comment(line).trim();
            let mut parts = line.splitn(2, char::is_whitespace);
            let keyword = parts.next().unwrap_or_default();
            let rest = parts.next().unwrap_or_default();

            match keyword {
                "module" => {
                    if module.is_some() {
                        return Err(MirrorError::config(
                            origin,
                            format!("line {}: repeated module directive", lineno + 1),
                        ));
                    }
                    let value = directive_value(rest).ok_or_else(|| {
                        MirrorError::config(
                            origin,
                            format!("line {}: malformed module directive", lineno + 1),
                        )
                    })?;
                    module = Some(value);
                }
                "go" => go_version = directive_value(rest),
                _ => {}
            }
        }

        let module = module.ok_or_else(|| MirrorError::config(origin, "no module path"))?;
        Ok(Self { module, go_version })
    }

    /// Read the manifest at the root of a module directory
    pub fn from_dir(dir: &Path) -> Result<Self, MirrorError> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|e| MirrorError::config(&path, format!("cannot read manifest: {}", e)))?;
        Self::parse(&text, &path)
    }

    /// Manifest text declaring this module, without requirements
    pub fn render(&self) -> String {
        let mut out = format!("module {}\n", self.module);
        if let Some(go) = &self.go_version {
            out.push_str(&format!("\ngo {}\n", go));
        }
        out
    }

    /// Make sure `dir` holds a manifest declaring this module.
    ///
    /// An existing manifest for the same module is kept as-is so the lock
    /// step's requirements survive re-runs. Returns whether a file was written.
    pub fn ensure_in(&self, dir: &Path) -> Result<bool, MirrorError> {
        let path = dir.join(MANIFEST_FILE);
        if let Ok(text) = fs::read_to_string(&path) {
            if let Ok(existing) = Self::parse(&text, &path) {
                if existing.module == self.module {
                    return Ok(false);
                }
            }
        }
        fsutil::write_atomic(&path, self.render().as_bytes(), None)?;
        Ok(true)
    }
}
