//! Content tree building.
//!
//! Walks the posts directory and produces the [`FolderNode`] tree that is
//! written out as the site index. Every directory becomes a folder node,
//! every `.md` file becomes a [`ContentFile`]:
//!
//! ```text
//! posts/                          # content root
//! ├── about.md                    # → files[0], path "about"
//! ├── 2025/                       # → folders["2025"]
//! │   ├── trip.md                 # → path "2025/trip"
//! │   └── notes/
//! │       └── draft.md            # → path "2025/notes/draft"
//! └── empty/                      # kept, no timestamp, no cover
//! ```
//!
//! ## Per-file data
//!
//! - **meta**: the decoded header, minus any raw `URL` key.
//! - **mtimeMs**: the header `Date` when it parses, otherwise the file's
//!   modification time. A bad or missing date never leaves a post without a
//!   timestamp.
//! - **cover**: resolved through [`ImageMap::resolve_file_cover`].
//!
//! ## Per-folder data
//!
//! After its children are built, a folder's `mtimeMs` becomes the newest
//! timestamp in its subtree and its cover is resolved by folder name.
//!
//! ## Failure tolerance
//!
//! A build is a pure function of what is on disk. Files that can't be read
//! (permissions, invalid UTF-8) are skipped with a warning; they never abort
//! the build. Hidden entries (`.git`, `.DS_Store`) and the index file itself
//! are ignored. Only a missing content root is an error.

use crate::config::SiteConfig;
use crate::header;
use crate::images::{CoverPrecedence, ImageMap};
use crate::types::{ContentFile, FolderNode};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content root not found: {0}")]
    MissingRoot(PathBuf),
}

/// Settings that shape the tree, independent of where it is read from.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// First segment of every `file` path (`posts` → `/posts/...`).
    pub marker: String,
    /// Filename skipped in the content root (the index itself).
    pub index_name: Option<String>,
    pub precedence: CoverPrecedence,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            marker: "posts".to_string(),
            index_name: Some("index.json".to_string()),
            precedence: CoverPrecedence::default(),
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &SiteConfig) -> Self {
        let index_name = Path::new(&config.content.index_file)
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        Self {
            marker: config.content.posts_dir.trim_matches('/').to_string(),
            index_name,
            precedence: config.covers.clone(),
        }
    }
}

/// Build the index for a whole site: scan images, then the posts tree.
pub fn scan_site(site_root: &Path, config: &SiteConfig) -> Result<FolderNode, ScanError> {
    let images = ImageMap::scan(
        site_root,
        &config.content.images_dir,
        &config.content.public_prefix,
    );
    debug!(images = images.len(), "image map ready");
    let options = ScanOptions::from_config(config);
    build(&site_root.join(&config.content.posts_dir), &images, &options)
}

/// Build the content tree rooted at `content_root`.
pub fn build(
    content_root: &Path,
    images: &ImageMap,
    options: &ScanOptions,
) -> Result<FolderNode, ScanError> {
    if !content_root.is_dir() {
        return Err(ScanError::MissingRoot(content_root.to_path_buf()));
    }
    let root = build_folder(content_root, &[], images, options)?;
    info!(
        files = root.file_count(),
        folders = root.folder_count(),
        "content tree built"
    );
    Ok(root)
}

fn build_folder(
    dir: &Path,
    segments: &[String],
    images: &ImageMap,
    options: &ScanOptions,
) -> Result<FolderNode, ScanError> {
    let (subdirs, posts) = collect_entries(dir, segments.is_empty(), options)?;
    let mut node = FolderNode::default();

    for (name, path) in subdirs {
        let mut child_segments = segments.to_vec();
        child_segments.push(name.clone());
        let child = match build_folder(&path, &child_segments, images, options) {
            Ok(child) => child,
            Err(ScanError::Io(e)) => {
                warn!(path = %path.display(), error = %e, "unreadable folder, indexing it empty");
                let mut empty = FolderNode::default();
                empty.cover = images.resolve_folder_cover(&child_segments, &options.precedence);
                empty
            }
            Err(e) => return Err(e),
        };
        node.folders.insert(name, child);
    }

    node.files = posts
        .par_iter()
        .filter_map(|path| read_post(path, segments, images, options))
        .collect();

    node.refresh_recency();
    node.cover = images.resolve_folder_cover(segments, &options.precedence);
    Ok(node)
}

/// Split a directory into sorted subdirectories and sorted `.md` files.
fn collect_entries(
    dir: &Path,
    is_root: bool,
    options: &ScanOptions,
) -> Result<(Vec<(String, PathBuf)>, Vec<PathBuf>), ScanError> {
    let mut subdirs = Vec::new();
    let mut posts = Vec::new();

    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if is_root && options.index_name.as_deref() == Some(name.as_str()) {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push((name, entry.path()));
        } else if file_type.is_file() && name.ends_with(".md") {
            posts.push(entry.path());
        }
    }

    subdirs.sort();
    posts.sort();
    Ok((subdirs, posts))
}

/// Read and index one post. `None` when the file can't be read.
fn read_post(
    path: &Path,
    segments: &[String],
    images: &ImageMap,
    options: &ScanOptions,
) -> Option<ContentFile> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable post");
            return None;
        }
    };
    let filename = path.file_name()?.to_string_lossy().to_string();
    let slug = filename.strip_suffix(".md").unwrap_or(&filename).to_string();

    let mut meta = header::decode(&raw).meta;
    meta.remove("URL");

    let mtime_ms = match meta.get("Date").and_then(|d| parse_date(d)) {
        Some(ms) => ms,
        None => modified_ms(path)?,
    };

    let cover = images.resolve_file_cover(
        meta.get("ImageURL").map(String::as_str),
        &slug,
        segments,
        &options.precedence,
    );

    let mut file_parts = vec![options.marker.as_str()];
    file_parts.extend(segments.iter().map(String::as_str));
    file_parts.push(&filename);
    let file = format!("/{}", crate::naming::normalize_folder(&file_parts.join("/")));

    let mut key_parts: Vec<&str> = segments.iter().map(String::as_str).collect();
    key_parts.push(&slug);

    Some(ContentFile {
        path: crate::naming::normalize_folder(&key_parts.join("/")),
        slug,
        file,
        meta,
        mtime_ms,
        cover,
    })
}

fn modified_ms(path: &Path) -> Option<i64> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Some(DateTime::<Utc>::from(time).timestamp_millis()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no modification time, skipping post");
            None
        }
    }
}

/// Parse a header `Date` into epoch milliseconds.
///
/// Accepts RFC 3339, RFC 2822, and the common `YYYY-MM-DD[ HH:MM[:SS]]`
/// shapes (with `T` or space). Dates without an offset are read as UTC.
pub fn parse_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp_millis());
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Write the index as pretty JSON, replacing any previous index atomically.
///
/// Each call writes through its own temporary file next to the index, so
/// overlapping writers never share a partial file; the last rename wins.
pub fn write_index(tree: &FolderNode, path: &Path) -> Result<(), ScanError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, tree)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a previously written index.
pub fn load_index(path: &Path) -> Result<FolderNode, ScanError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
