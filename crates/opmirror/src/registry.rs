//! Operators file (operators.toml)
//!
//! The registry of mirror jobs. Loaded once, validated, then processed
//! sequentially; the first failing operator aborts the run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MirrorError;
use crate::operator::{MirrorReport, MirrorSettings, MirrorsDir, OperatorConfig};
use crate::tag::TagReport;
use crate::tools::{DependencyLocker, TagStore};

/// Default registry file name
pub const DEFAULT_OPERATORS_FILE: &str = "operators.toml";

/// The list of operators to mirror
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorsFile {
    #[serde(default)]
    pub operators: Vec<OperatorConfig>,

    /// Directory relative upstream paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

fn is_safe_segment(seg: &str) -> bool {
    !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\')
}

/// Slugs become module path elements, which Go does not allow to start with a dot
fn is_valid_slug(slug: &str) -> bool {
    is_safe_segment(slug) && !slug.contains('/') && !slug.starts_with('.')
}

fn is_safe_rel_path(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    !path.starts_with('/') && path.split('/').all(is_safe_segment)
}

impl OperatorsFile {
    /// Load and validate a registry. JSON is accepted for `.json` files,
    /// TOML otherwise.
    pub fn from_file(path: &Path) -> Result<Self, MirrorError> {
        let text = fs::read_to_string(path)
            .map_err(|e| MirrorError::config(path, format!("cannot read registry: {}", e)))?;
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let file = if is_json {
            Self::from_json_str(&text, base_dir)
        } else {
            Self::from_toml_str(&text, base_dir)
        };
        file.map_err(|e| match e {
            MirrorError::Configuration { message, .. } => MirrorError::config(path, message),
            other => other,
        })
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let base_dir = base_dir.into();
        let mut file: OperatorsFile = toml::from_str(text)
            .map_err(|e| MirrorError::config(&base_dir, format!("malformed registry: {}", e)))?;
        file.base_dir = base_dir;
        file.validate()?;
        Ok(file)
    }

    /// Parse and validate JSON text
    pub fn from_json_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let base_dir = base_dir.into();
        let mut file: OperatorsFile = serde_json::from_str(text)
            .map_err(|e| MirrorError::config(&base_dir, format!("malformed registry: {}", e)))?;
        file.base_dir = base_dir;
        file.validate()?;
        Ok(file)
    }

    /// Build a registry in code
    pub fn new(operators: Vec<OperatorConfig>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            operators,
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Check slugs, versions and API paths; slugs must be unique.
    pub fn validate(&self) -> Result<(), MirrorError> {
        let fail = |message: String| Err(MirrorError::config(&self.base_dir, message));
        let mut seen = HashSet::new();

        for (index, op) in self.operators.iter().enumerate() {
            if !is_valid_slug(&op.slug) {
                return fail(format!("operator #{}: invalid slug {:?}", index + 1, op.slug));
            }
            if !seen.insert(op.slug.as_str()) {
                return fail(format!("duplicate slug {:?}", op.slug));
            }
            if op.version.trim().is_empty() {
                return fail(format!("operator {}: empty version", op.slug));
            }
            if op.api_paths.is_empty() {
                return fail(format!("operator {}: no api_paths", op.slug));
            }
            if let Some(bad) = op.api_paths.iter().find(|p| !is_safe_rel_path(p)) {
                return fail(format!("operator {}: invalid api path {:?}", op.slug, bad));
            }
        }

        Ok(())
    }

    /// Operators selected by `target`; all of them when no target is given.
    ///
    /// An unknown target selects nothing.
    pub fn select(&self, target: Option<&str>) -> Vec<&OperatorConfig> {
        self.operators
            .iter()
            .filter(|op| target.map_or(true, |slug| op.slug == slug))
            .collect()
    }

    /// Mirror the selected operators in order, stopping at the first failure.
    pub fn process(
        &self,
        settings: &MirrorSettings,
        target: Option<&str>,
        locker: &dyn DependencyLocker,
    ) -> Result<Vec<MirrorReport>, MirrorError> {
        self.select(target)
            .into_iter()
            .map(|op| op.mirror(&self.base_dir, settings, locker))
            .collect()
    }

    /// Ensure every operator's version tag exists, stopping at the first failure.
    pub fn tag(&self, mirrors: &MirrorsDir, store: &dyn TagStore) -> Result<TagReport, MirrorError> {
        let mut report = TagReport::default();
        for op in &self.operators {
            let state = op.tag(mirrors, store)?;
            let name = op
                .tag_name(mirrors)
                .map_err(|e| MirrorError::for_operator(&op.slug, e))?;
            report.record(&name, state);
        }
        Ok(report)
    }
}
