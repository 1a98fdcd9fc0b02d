//! Shared test utilities for the folio test suite.
//!
//! Provides fixture setup, post writers, lookup helpers that panic with a
//! useful message on miss, and tree-shape assertions for [`FolderNode`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let root = scan_site(tmp.path(), &SiteConfig::default()).unwrap();
//!
//! let travel = find_folder(&root, "travel/japan");
//! let post = find_file(travel, "tokyo");
//! assert_eq!(post.display_name(), "Tokyo Nights");
//! assert_recency_monotonic(&root);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

use crate::header::{self, Meta};
use crate::types::{ContentFile, FolderNode};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write a post with a Title (and optional Date) header under `dir`.
///
/// `rel` may contain folders; they are created as needed.
pub fn write_post(dir: &Path, rel: &str, title: &str, date: Option<&str>) -> PathBuf {
    let mut meta = Meta::new();
    meta.insert("Title".into(), title.into());
    if let Some(date) = date {
        meta.insert("Date".into(), date.into());
    }
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, header::compose(&meta, "Body")).unwrap();
    path
}

/// Force a file's modification time.
pub fn set_mtime(path: &Path, when: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

// =========================================================================
// Tree lookups (panic with a clear message on miss)
// =========================================================================

/// Find a folder by slash path from the root. Panics if not found.
pub fn find_folder<'a>(root: &'a FolderNode, path: &str) -> &'a FolderNode {
    let segments = crate::naming::segments(path);
    root.folder_at(&segments).unwrap_or_else(|| {
        let paths = root.folder_paths();
        panic!("folder '{path}' not found. Available: {paths:?}")
    })
}

/// Find a direct file of `node` by slug. Panics if not found.
pub fn find_file<'a>(node: &'a FolderNode, slug: &str) -> &'a ContentFile {
    node.files.iter().find(|f| f.slug == slug).unwrap_or_else(|| {
        let slugs = file_slugs(node);
        panic!("file '{slug}' not found. Available: {slugs:?}")
    })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// Slugs of the direct files of `node`, in order.
pub fn file_slugs(node: &FolderNode) -> Vec<&str> {
    node.files.iter().map(|f| f.slug.as_str()).collect()
}

/// Names of the direct child folders of `node`, sorted.
pub fn folder_names(node: &FolderNode) -> Vec<&str> {
    node.folders.keys().map(String::as_str).collect()
}

// =========================================================================
// Tree assertions
// =========================================================================

/// Assert every folder's timestamp is the max of its subtree, recursively.
pub fn assert_recency_monotonic(node: &FolderNode) {
    for (name, child) in &node.folders {
        assert_recency_monotonic(child);
        if let Some(child_ms) = child.mtime_ms {
            let parent_ms = node
                .mtime_ms
                .unwrap_or_else(|| panic!("parent of '{name}' has no timestamp"));
            assert!(parent_ms >= child_ms, "folder '{name}' is newer than its parent");
        }
    }
    for file in &node.files {
        let parent_ms = node.mtime_ms.expect("folder with files has a timestamp");
        assert!(parent_ms >= file.mtime_ms, "file '{}' is newer than its folder", file.slug);
    }
    let expected = node
        .files
        .iter()
        .map(|f| f.mtime_ms)
        .chain(node.folders.values().filter_map(|c| c.mtime_ms))
        .max();
    assert_eq!(node.mtime_ms, expected, "folder timestamp is not the subtree max");
}
