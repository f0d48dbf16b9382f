//! Shared fixtures and fakes for integration tests

#![allow(dead_code)]

use opmirror::{DependencyLocker, TagStore, ToolError};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const UPSTREAM_MODULE: &str = "example.com/up";
pub const ROOT_MODULE: &str = "example.com/mirror";

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Upstream checkout with an API package, a two-hop internal chain, an
/// unused internal package and a test file.
pub fn create_upstream(root: &Path) {
    write(root, "go.mod", "module example.com/up\n\ngo 1.22\n\nrequire example.com/external/lib v1.0.0\n");
    write(
        root,
        "api/v1/types.go",
        r#"package v1

import (
	"example.com/external/lib"
	"example.com/up/internal/widgets"
)

// Widget mirrors widgets.Spec.
type Widget struct {
	Spec widgets.Spec
	Ref  lib.Ref
}
"#,
    );
    write(
        root,
        "api/v1/types_test.go",
        "package v1\n\nimport \"testing\"\n\nfunc TestNothing(t *testing.T) {}\n",
    );
    write(
        root,
        "internal/widgets/spec.go",
        "package widgets\n\nimport \"example.com/up/internal/util\"\n\ntype Spec struct{ ID util.ID }\n",
    );
    write(root, "internal/util/id.go", "package util\n\ntype ID string\n");
    write(root, "internal/unused/unused.go", "package unused\n");
    write(root, "cmd/main.go", "package main\n\nfunc main() {}\n");
}

/// Registry text for one operator per slug, all sharing the same upstream.
pub fn registry_toml(slugs: &[&str]) -> String {
    let mut out = String::new();
    for slug in slugs {
        out.push_str(&format!(
            "[[operators]]\nslug = \"{slug}\"\nupstream = \"upstream\"\nversion = \"v1.0.0\"\napi_paths = [\"api\"]\n\n"
        ));
    }
    out
}

/// Collect every file below `root` with its contents, sorted by path.
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.push((rel, fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Lock step that only records the directories it was given
#[derive(Default)]
pub struct RecordingLocker {
    pub calls: RefCell<Vec<PathBuf>>,
    pub fail: bool,
}

impl DependencyLocker for RecordingLocker {
    fn resolve_dependencies(&self, dir: &Path) -> Result<(), ToolError> {
        self.calls.borrow_mut().push(dir.to_path_buf());
        if self.fail {
            return Err(ToolError::Failed {
                command: "go mod tidy".to_string(),
                dir: dir.to_path_buf(),
                code: Some(1),
                stderr: None,
            });
        }
        Ok(())
    }
}

/// In-memory tag namespace
#[derive(Default)]
pub struct MemoryTags {
    pub tags: RefCell<BTreeSet<String>>,
    pub created: RefCell<Vec<String>>,
    pub broken: bool,
}

impl TagStore for MemoryTags {
    fn tag_exists(&self, name: &str) -> Result<bool, ToolError> {
        if self.broken {
            return Err(ToolError::Failed {
                command: format!("git show-ref --tags --verify --quiet refs/tags/{name}"),
                dir: PathBuf::from("/repo"),
                code: Some(128),
                stderr: Some("fatal: not a git repository".to_string()),
            });
        }
        Ok(self.tags.borrow().contains(name))
    }

    fn create_tag(&self, name: &str) -> Result<(), ToolError> {
        self.tags.borrow_mut().insert(name.to_string());
        self.created.borrow_mut().push(name.to_string());
        Ok(())
    }
}
