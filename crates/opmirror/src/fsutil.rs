//! File copying for mirror trees
//!
//! Selects compilable Go sources (no tests), copies single packages or whole
//! trees, and writes every destination file atomically.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::MirrorError;

/// Extension of compilable source files
pub const SOURCE_EXT: &str = "go";

/// Suffix marking test files, which are never mirrored
pub const TEST_SUFFIX: &str = "_test.go";

/// Check whether a path names a compilable, non-test Go source file
pub fn is_go_source(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT) && !name.ends_with(TEST_SUFFIX)
}

/// Directories the Go tool never treats as packages
fn is_skipped_dir(name: &str) -> bool {
    name == "testdata" || name.starts_with('.') || name.starts_with('_')
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| !is_skipped_dir(name))
        .unwrap_or(false)
}

/// Regular files and symlinks to regular files; directory links are not followed.
fn is_regular_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

fn walk_sources(root: &Path, max_depth: usize) -> Result<Vec<PathBuf>, MirrorError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            MirrorError::io(path, e.into())
        })?;
        if is_regular_file(&entry) && is_go_source(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// All Go sources below `root`, recursively, in sorted order
pub fn go_files_in_tree(root: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    walk_sources(root, usize::MAX)
}

/// Go sources directly inside `dir` (one package), in sorted order
pub fn go_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    walk_sources(dir, 1)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".opmirror-tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MirrorError::io(parent, e))?;
    }
    Ok(())
}

fn finish_atomic(tmp: &Path, dst: &Path) -> Result<(), MirrorError> {
    if let Err(e) = fs::rename(tmp, dst) {
        let _ = fs::remove_file(tmp);
        return Err(MirrorError::io(dst, e));
    }
    Ok(())
}

/// Copy one file, replacing the destination atomically.
///
/// Permissions are carried over from the source. Missing parent directories
/// are created.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), MirrorError> {
    ensure_parent(dst)?;
    let tmp = temp_sibling(dst);
    if let Err(e) = fs::copy(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(MirrorError::io(src, e));
    }
    finish_atomic(&tmp, dst)
}

/// Write `contents` to `path` atomically, optionally applying `perms`
pub fn write_atomic(
    path: &Path,
    contents: &[u8],
    perms: Option<fs::Permissions>,
) -> Result<(), MirrorError> {
    ensure_parent(path)?;
    let tmp = temp_sibling(path);
    fs::write(&tmp, contents).map_err(|e| MirrorError::io(&tmp, e))?;
    if let Some(perms) = perms {
        if let Err(e) = fs::set_permissions(&tmp, perms) {
            let _ = fs::remove_file(&tmp);
            return Err(MirrorError::io(&tmp, e));
        }
    }
    finish_atomic(&tmp, path)
}

fn copy_listed(
    files: Vec<PathBuf>,
    src_root: &Path,
    dst_root: &Path,
) -> Result<Vec<PathBuf>, MirrorError> {
    fs::create_dir_all(dst_root).map_err(|e| MirrorError::io(dst_root, e))?;

    let mut written = Vec::with_capacity(files.len());
    for src in files {
        let Ok(rel) = src.strip_prefix(src_root) else {
            continue;
        };
        let dst = dst_root.join(rel);
        copy_file(&src, &dst)?;
        written.push(dst);
    }
    Ok(written)
}

/// Copy every Go source below `src_root` into `dst_root`, keeping relative paths.
///
/// Returns the destination paths written, sorted.
pub fn copy_tree(src_root: &Path, dst_root: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    let files = go_files_in_tree(src_root)?;
    copy_listed(files, src_root, dst_root)
}

/// Copy the Go sources of a single package directory (non-recursive).
pub fn copy_package(src_dir: &Path, dst_dir: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    let files = go_files_in_dir(src_dir)?;
    copy_listed(files, src_dir, dst_dir)
}
