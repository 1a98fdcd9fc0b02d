//! Read-side queries over the content index.
//!
//! Every view of the site (the posts root, a folder page, a single post, a
//! search result list) is derived from the same [`FolderNode`] tree through
//! the functions here. There is one implementation for the root and for
//! folders; the root is just a folder with no path.
//!
//! ## Path resolution
//!
//! Request paths look like `/posts/travel/japan/tokyo`. [`split_path`] turns
//! that into decoded segments, and [`resolve`] walks the tree:
//!
//! ```text
//! []                          → Root
//! ["travel", "japan"]         → Folder (every segment matched a folder)
//! ["travel", "japan", "tokyo"]→ File   (first non-folder segment onward
//!                                       matched a slug or path key)
//! ["travel", "nope"]          → NotFound
//! ```
//!
//! ## Search
//!
//! [`search`] collects every descendant of a folder (not the folder itself)
//! and matches the query against `name\ndescription\nslug`:
//!
//! | Query          | Meaning                                     |
//! |----------------|---------------------------------------------|
//! | `/pattern/`    | case-insensitive regex                      |
//! | contains `*`   | glob, `*` matches anything                  |
//! | anything else  | case-insensitive substring                  |
//!
//! A regex that fails to compile is searched for literally instead.

use crate::naming::normalize_folder;
use crate::types::{ContentFile, FolderNode};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Split a request path into decoded segments.
///
/// Segments are percent-decoded with `+` read as a space; a segment that
/// doesn't decode is kept raw. A leading `marker` segment (`posts`) is dropped.
pub fn split_path(request: &str, marker: &str) -> Vec<String> {
    let mut segments: Vec<String> = request
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect();
    if !marker.is_empty() && segments.first().is_some_and(|s| s == marker) {
        segments.remove(0);
    }
    segments
}

fn decode_segment(segment: &str) -> String {
    let spaced = segment.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Where a request path lands in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Root(&'a FolderNode),
    Folder {
        node: &'a FolderNode,
        segments: Vec<String>,
    },
    File {
        file: &'a ContentFile,
        parent: Vec<String>,
    },
    NotFound,
}

/// Resolve decoded segments against the tree.
pub fn resolve<'a>(root: &'a FolderNode, segments: &[String]) -> Resolution<'a> {
    if segments.is_empty() {
        return Resolution::Root(root);
    }

    let mut node = root;
    let mut depth = 0;
    while let Some(child) = segments.get(depth).and_then(|s| node.folders.get(s)) {
        node = child;
        depth += 1;
    }

    if depth == segments.len() {
        return Resolution::Folder {
            node,
            segments: segments.to_vec(),
        };
    }

    let parent = &segments[..depth];
    let rest = segments[depth..].join("/");
    let key = normalize_folder(&format!("{}/{rest}", parent.join("/")));
    match node.files.iter().find(|f| f.slug == rest || f.path == key) {
        Some(file) => Resolution::File {
            file,
            parent: parent.to_vec(),
        },
        None => Resolution::NotFound,
    }
}

/// A folder or a post, as shown in listings and search results.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<'a> {
    Folder {
        name: &'a str,
        node: &'a FolderNode,
        segments: Vec<String>,
    },
    File {
        file: &'a ContentFile,
        parent: Vec<String>,
    },
}

impl Entry<'_> {
    /// Folder name, or the post's Title falling back to its slug.
    pub fn name(&self) -> &str {
        match self {
            Entry::Folder { name, .. } => name,
            Entry::File { file, .. } => file.display_name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Entry::Folder { .. } => "",
            Entry::File { file, .. } => file.description(),
        }
    }

    /// Folder name, or the post slug.
    pub fn slug(&self) -> &str {
        match self {
            Entry::Folder { name, .. } => name,
            Entry::File { file, .. } => &file.slug,
        }
    }

    /// Recency used for sorting. Folders without posts have none.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Entry::Folder { node, .. } => node.mtime_ms,
            Entry::File { file, .. } => Some(file.mtime_ms),
        }
    }

    pub fn cover(&self) -> Option<&str> {
        match self {
            Entry::Folder { node, .. } => node.cover.as_deref(),
            Entry::File { file, .. } => file.cover.as_deref(),
        }
    }

    /// Slash path of the entry below the posts root.
    pub fn path(&self) -> String {
        match self {
            Entry::Folder { segments, .. } => segments.join("/"),
            Entry::File { file, .. } => file.path.clone(),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder { .. })
    }

    fn haystack(&self) -> String {
        format!("{}\n{}\n{}", self.name(), self.description(), self.slug())
    }
}

/// A compiled search query.
#[derive(Debug, Clone)]
pub struct Query(Regex);

impl Query {
    /// Compile a raw query. Blank queries compile to `None`.
    pub fn compile(raw: &str) -> Option<Self> {
        let q = raw.trim();
        if q.is_empty() {
            return None;
        }
        let pattern = if q.len() >= 2 && q.starts_with('/') && q.ends_with('/') {
            let inner = &q[1..q.len() - 1];
            if insensitive(inner).is_some() {
                inner.to_string()
            } else {
                regex::escape(inner)
            }
        } else if q.contains('*') {
            regex::escape(q).replace(r"\*", ".*")
        } else {
            regex::escape(q)
        };
        insensitive(&pattern).map(Query)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

fn insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

/// Which entry kinds a search returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchFilter {
    #[default]
    All,
    Files,
    Folders,
}

impl SearchFilter {
    fn admits(self, entry: &Entry<'_>) -> bool {
        match self {
            SearchFilter::All => true,
            SearchFilter::Files => !entry.is_folder(),
            SearchFilter::Folders => entry.is_folder(),
        }
    }
}

impl FromStr for SearchFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SearchFilter::All),
            "files" => Ok(SearchFilter::Files),
            "folders" => Ok(SearchFilter::Folders),
            other => Err(format!("unknown filter '{other}' (all, files, folders)")),
        }
    }
}

/// Every descendant of `node`: for each child folder, the folder then its
/// subtree; then the node's own files.
pub fn descendants<'a>(node: &'a FolderNode, base: &[String]) -> Vec<Entry<'a>> {
    let mut out = Vec::new();
    collect_descendants(node, base, &mut out);
    out
}

fn collect_descendants<'a>(node: &'a FolderNode, base: &[String], out: &mut Vec<Entry<'a>>) {
    for (name, child) in &node.folders {
        let mut segments = base.to_vec();
        segments.push(name.clone());
        out.push(Entry::Folder {
            name,
            node: child,
            segments: segments.clone(),
        });
        collect_descendants(child, &segments, out);
    }
    for file in &node.files {
        out.push(Entry::File {
            file,
            parent: base.to_vec(),
        });
    }
}

/// Search the subtree under `node` (located at `base`).
///
/// Results come back in traversal order; callers sort as needed.
pub fn search<'a>(
    node: &'a FolderNode,
    base: &[String],
    raw_query: &str,
    filter: SearchFilter,
) -> Vec<Entry<'a>> {
    let Some(query) = Query::compile(raw_query) else {
        return Vec::new();
    };
    descendants(node, base)
        .into_iter()
        .filter(|entry| query.is_match(&entry.haystack()))
        .filter(|entry| filter.admits(entry))
        .collect()
}

/// Direct children of `node`, newest first.
pub fn listing<'a>(node: &'a FolderNode, base: &[String]) -> Vec<Entry<'a>> {
    let mut entries: Vec<Entry<'a>> = node
        .folders
        .iter()
        .map(|(name, child)| {
            let mut segments = base.to_vec();
            segments.push(name.clone());
            Entry::Folder {
                name,
                node: child,
                segments,
            }
        })
        .chain(node.files.iter().map(|file| Entry::File {
            file,
            parent: base.to_vec(),
        }))
        .collect();
    sort(&mut entries, SortMode::Newest);
    entries
}

/// Ordering for listings and search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    NameAsc,
    NameDesc,
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name-asc" => Ok(SortMode::NameAsc),
            "name-desc" => Ok(SortMode::NameDesc),
            "newest" => Ok(SortMode::Newest),
            "oldest" => Ok(SortMode::Oldest),
            other => Err(format!(
                "unknown sort '{other}' (name-asc, name-desc, newest, oldest)"
            )),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMode::NameAsc => "name-asc",
            SortMode::NameDesc => "name-desc",
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
        })
    }
}

/// Stable sort. Entries without a timestamp sort as the earliest.
pub fn sort(entries: &mut [Entry<'_>], mode: SortMode) {
    entries.sort_by(|a, b| compare(a, b, mode));
}

fn compare(a: &Entry<'_>, b: &Entry<'_>, mode: SortMode) -> Ordering {
    match mode {
        SortMode::NameAsc => a.name().cmp(b.name()),
        SortMode::NameDesc => b.name().cmp(a.name()),
        SortMode::Newest => b.timestamp().cmp(&a.timestamp()),
        SortMode::Oldest => a.timestamp().cmp(&b.timestamp()),
    }
}

/// Find a post by any of the spellings an admin might use for it.
///
/// `target` is a store path such as `posts/2025/trip.md`. A file matches when
/// its file path equals `target` or the target without its `marker/` prefix,
/// or when that shorter form equals its path key, slug, filename, or a
/// trailing part of its file path. Returns the store path (no leading slash).
pub fn find_file_loose(root: &FolderNode, target: &str, marker: &str) -> Option<String> {
    let target = target.trim_start_matches('/');
    let given = target
        .strip_prefix(&format!("{marker}/"))
        .unwrap_or(target);
    find_loose_in(root, target, given)
}

fn find_loose_in(node: &FolderNode, target: &str, given: &str) -> Option<String> {
    for file in &node.files {
        let file_path = file.file.trim_start_matches('/');
        if file_path == target
            || file_path == given
            || file.path == given
            || file.slug == given
            || file.filename() == given
            || file_path.ends_with(&format!("/{given}"))
        {
            return Some(file_path.to_string());
        }
    }
    node.folders
        .values()
        .find_map(|child| find_loose_in(child, target, given))
}
