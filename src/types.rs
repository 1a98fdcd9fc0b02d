//! The index document: the content tree as written by [`scan`](crate::scan)
//! and read back by [`navigate`](crate::navigate) and the admin backend.
//!
//! The JSON shape is what the site's client scripts consume, so field names
//! follow that contract rather than Rust naming:
//!
//! ```json
//! {
//!   "folders": { "2025": { "folders": {}, "files": [ … ], "mtimeMs": 1735689600000 } },
//!   "files": [
//!     { "slug": "about", "file": "/posts/about.md", "path": "about",
//!       "meta": { "Title": "About" }, "mtimeMs": 1735689600000, "cover": null }
//!   ],
//!   "mtimeMs": 1735689600000
//! }
//! ```

use crate::header::Meta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A post as recorded in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    /// Filename without `.md`; unique within its folder.
    pub slug: String,
    /// Site path of the markdown file, e.g. `/posts/2025/trip.md`.
    pub file: String,
    /// Folder path plus slug, e.g. `2025/trip`.
    pub path: String,
    #[serde(default)]
    pub meta: Meta,
    /// Recency in epoch milliseconds: the header `Date` if it parses,
    /// otherwise the file's modification time.
    #[serde(rename = "mtimeMs", default)]
    pub mtime_ms: i64,
    #[serde(default)]
    pub cover: Option<String>,
}

impl ContentFile {
    /// `Title` from the header, else the slug.
    pub fn display_name(&self) -> &str {
        self.meta
            .get("Title")
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.slug)
    }

    pub fn description(&self) -> &str {
        self.meta.get("Description").map(String::as_str).unwrap_or("")
    }

    /// Last component of [`file`](Self::file).
    pub fn filename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}

/// A folder and everything below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    #[serde(default)]
    pub folders: BTreeMap<String, FolderNode>,
    #[serde(default)]
    pub files: Vec<ContentFile>,
    /// Newest timestamp anywhere in the subtree; absent when it holds no posts.
    #[serde(rename = "mtimeMs", default, skip_serializing_if = "Option::is_none")]
    pub mtime_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

impl FolderNode {
    /// Recompute [`mtime_ms`](Self::mtime_ms) from direct files and child folders.
    pub fn refresh_recency(&mut self) {
        let files = self.files.iter().map(|f| f.mtime_ms);
        let folders = self.folders.values().filter_map(|n| n.mtime_ms);
        self.mtime_ms = files.chain(folders).max();
    }

    /// Number of posts in the whole subtree.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.folders.values().map(FolderNode::file_count).sum::<usize>()
    }

    /// Number of folders below this one (not counting itself).
    pub fn folder_count(&self) -> usize {
        self.folders.len() + self.folders.values().map(FolderNode::folder_count).sum::<usize>()
    }

    /// Every folder below this one as a slash-joined path, parents first.
    pub fn folder_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_folder_paths(self, "", &mut out);
        out
    }

    /// Every post in the subtree, depth-first, folders before files.
    pub fn all_files(&self) -> Vec<&ContentFile> {
        let mut out = Vec::new();
        collect_files(self, &mut out);
        out
    }

    /// Descend along `segments`, returning the folder if every step exists.
    pub fn folder_at(&self, segments: &[String]) -> Option<&FolderNode> {
        segments
            .iter()
            .try_fold(self, |node, seg| node.folders.get(seg))
    }
}

fn collect_folder_paths(node: &FolderNode, prefix: &str, out: &mut Vec<String>) {
    for (name, child) in &node.folders {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        out.push(path.clone());
        collect_folder_paths(child, &path, out);
    }
}

fn collect_files<'a>(node: &'a FolderNode, out: &mut Vec<&'a ContentFile>) {
    for child in node.folders.values() {
        collect_files(child, out);
    }
    out.extend(node.files.iter());
}
