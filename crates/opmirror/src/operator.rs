//! Operator definitions and the per-operator mirror pipeline
//!
//! One operator describes one upstream checkout whose API surface is mirrored
//! into `<mirrors path>/<slug>` as a standalone module.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::closure::{ClosureResolver, ResolvedPackage};
use crate::error::MirrorError;
use crate::fsutil;
use crate::gomod::GoModule;
use crate::rewrite::{ImportRewriter, RewriteMode};
use crate::tag::{TagReconciler, TagState};
use crate::tools::{DependencyLocker, TagStore};

/// One mirror job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Short identifier, used for targeted runs and as the mirror directory name
    pub slug: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Local checkout of the upstream repository
    pub upstream: PathBuf,

    /// Version the mirror is tagged with
    pub version: String,

    /// API surface directories, relative to the upstream root
    pub api_paths: Vec<String>,

    /// Expected upstream module path; checked against the upstream go.mod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

/// Where mirrors live inside the hosting repository
///
/// `path` is relative to the repository root and doubles as the module path
/// and tag prefix of every mirror, so it may not be absolute, climb out with
/// `..`, or contain elements Go rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorsDir {
    /// Root of the hosting repository; the working directory when unset
    pub repo_root: Option<PathBuf>,

    /// Mirrors directory, relative to `repo_root`
    pub path: PathBuf,
}

impl MirrorsDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: None,
            path: path.into(),
        }
    }

    /// Resolve `path` against the repository at `root`
    pub fn in_repo(mut self, root: impl Into<PathBuf>) -> Self {
        self.repo_root = Some(root.into());
        self
    }

    /// Directory on disk holding the mirrors
    pub fn dir(&self) -> PathBuf {
        match &self.repo_root {
            Some(root) => root.join(&self.path),
            None => self.path.clone(),
        }
    }

    /// `/`-separated form of `path` as it appears in module paths and tags
    pub fn prefix(&self) -> Result<String, MirrorError> {
        mirrors_prefix(&self.path)
    }
}

/// Run-wide mirroring settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Directory receiving one mirror per operator
    pub mirrors: MirrorsDir,

    /// Module path of the repository hosting the mirrors
    pub root_module: String,

    /// How upstream references are rewritten
    pub rewrite: RewriteMode,
}

impl MirrorSettings {
    pub fn new(mirrors_path: impl Into<PathBuf>, root_module: impl Into<String>) -> Self {
        Self {
            mirrors: MirrorsDir::new(mirrors_path),
            root_module: root_module.into(),
            rewrite: RewriteMode::default(),
        }
    }

    pub fn in_repo(mut self, root: impl Into<PathBuf>) -> Self {
        self.mirrors = self.mirrors.in_repo(root);
        self
    }

    pub fn with_rewrite(mut self, rewrite: RewriteMode) -> Self {
        self.rewrite = rewrite;
        self
    }
}

/// What one mirror run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub slug: String,
    pub mirror_dir: PathBuf,
    pub upstream_module: String,
    pub mirror_module: String,
    /// API surface files copied
    pub api_files: usize,
    /// Internal packages copied, sorted by import path
    pub packages: Vec<ResolvedPackage>,
    /// Files whose imports were rewritten
    pub rewritten: Vec<PathBuf>,
    /// Whether go.mod was (re)written
    pub manifest_written: bool,
}

/// `/`-separated form of a relative mirrors path.
///
/// `.` components are dropped. Absolute paths, `..` and elements starting
/// with a dot are rejected: they cannot name a module inside the hosting
/// repository.
pub fn mirrors_prefix(mirrors_path: &Path) -> Result<String, MirrorError> {
    let invalid = |why: &str| MirrorError::config(mirrors_path, format!("invalid mirrors path: {}", why));

    let mut segments = Vec::new();
    for component in mirrors_path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(seg) => {
                let seg = seg.to_str().ok_or_else(|| invalid("not valid UTF-8"))?;
                if seg.starts_with('.') {
                    return Err(invalid("path elements may not start with '.'"));
                }
                segments.push(seg);
            }
            Component::ParentDir => return Err(invalid("'..' leaves the repository")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the repository root"))
            }
        }
    }
    Ok(segments.join("/"))
}

fn join_module_path(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn join_rel(base: &Path, rel: &str) -> PathBuf {
    rel.trim_end_matches('/')
        .split('/')
        .fold(base.to_path_buf(), |path, seg| path.join(seg))
}

impl OperatorConfig {
    /// Upstream root, resolved against the registry's directory when relative
    pub fn upstream_dir(&self, base_dir: &Path) -> PathBuf {
        if self.upstream.is_absolute() {
            self.upstream.clone()
        } else {
            base_dir.join(&self.upstream)
        }
    }

    /// Directory this operator is mirrored into
    pub fn mirror_dir(&self, mirrors: &MirrorsDir) -> PathBuf {
        mirrors.dir().join(&self.slug)
    }

    /// Module path of the mirror
    pub fn mirror_module(&self, settings: &MirrorSettings) -> Result<String, MirrorError> {
        let prefix = settings.mirrors.prefix()?;
        Ok(join_module_path(&[
            settings.root_module.as_str(),
            prefix.as_str(),
            self.slug.as_str(),
        ]))
    }

    /// Tag marking this operator's mirrored version
    pub fn tag_name(&self, mirrors: &MirrorsDir) -> Result<String, MirrorError> {
        let prefix = mirrors.prefix()?;
        Ok(join_module_path(&[
            prefix.as_str(),
            self.slug.as_str(),
            self.version.as_str(),
        ]))
    }

    /// Mirror this operator: copy the API surface, copy the internal packages
    /// it needs, rewrite imports, write go.mod and run the lock step.
    pub fn mirror(
        &self,
        base_dir: &Path,
        settings: &MirrorSettings,
        locker: &dyn DependencyLocker,
    ) -> Result<MirrorReport, MirrorError> {
        self.mirror_inner(base_dir, settings, locker)
            .map_err(|e| MirrorError::for_operator(&self.slug, e))
    }

    fn mirror_inner(
        &self,
        base_dir: &Path,
        settings: &MirrorSettings,
        locker: &dyn DependencyLocker,
    ) -> Result<MirrorReport, MirrorError> {
        let mirror_module = self.mirror_module(settings)?;
        let upstream_root = self.upstream_dir(base_dir);
        if !upstream_root.is_dir() {
            return Err(MirrorError::config(
                &upstream_root,
                "upstream checkout is not a directory",
            ));
        }

        let upstream = GoModule::from_dir(&upstream_root)?;
        if let Some(expected) = &self.module {
            if *expected != upstream.module {
                return Err(MirrorError::config(
                    upstream_root.join(crate::gomod::MANIFEST_FILE),
                    format!(
                        "declares module {}, registry expects {}",
                        upstream.module, expected
                    ),
                ));
            }
        }

        let mirror_dir = self.mirror_dir(&settings.mirrors);
        fs::create_dir_all(&mirror_dir).map_err(|e| MirrorError::io(&mirror_dir, e))?;

        let mut api_files = Vec::new();
        for api_path in &self.api_paths {
            let src = join_rel(&upstream_root, api_path);
            if !src.is_dir() {
                return Err(MirrorError::MissingApiPath { path: src });
            }
            let dst = join_rel(&mirror_dir, api_path);
            api_files.extend(fsutil::copy_tree(&src, &dst)?);
        }

        let resolver = ClosureResolver::new(&upstream.module, &upstream_root, &mirror_dir);
        let packages = resolver.resolve(&api_files)?;

        let rewriter = ImportRewriter::new(&upstream.module, &mirror_module, settings.rewrite);
        let rewritten = rewriter.rewrite_tree(&mirror_dir)?;

        let manifest = GoModule {
            module: mirror_module.clone(),
            go_version: upstream.go_version.clone(),
        };
        let manifest_written = manifest.ensure_in(&mirror_dir)?;

        locker.resolve_dependencies(&mirror_dir)?;

        Ok(MirrorReport {
            slug: self.slug.clone(),
            mirror_dir,
            upstream_module: upstream.module,
            mirror_module,
            api_files: api_files.len(),
            packages,
            rewritten,
            manifest_written,
        })
    }

    /// Ensure this operator's version tag exists.
    ///
    /// The mirror must already have been produced under `mirrors`.
    pub fn tag(&self, mirrors: &MirrorsDir, store: &dyn TagStore) -> Result<TagState, MirrorError> {
        self.tag_inner(mirrors, store)
            .map_err(|e| MirrorError::for_operator(&self.slug, e))
    }

    fn tag_inner(&self, mirrors: &MirrorsDir, store: &dyn TagStore) -> Result<TagState, MirrorError> {
        let name = self.tag_name(mirrors)?;
        let mirror_dir = self.mirror_dir(mirrors);
        if !mirror_dir.is_dir() {
            return Err(MirrorError::MissingMirror {
                slug: self.slug.clone(),
                dir: mirror_dir,
            });
        }

        let mut tag = TagReconciler::new(store, name);
        Ok(tag.create()?)
    }
}
