//! Cover image resolution.
//!
//! Authors rarely spell out which image belongs to a post. Instead they drop
//! images into the image-assets directory named after the post or its folder
//! (`2025.trip.png` for `posts/2025/trip.md`, `2025.png` for the whole
//! folder) and let the index builder find them. This module owns that
//! convention.
//!
//! ## The image map
//!
//! [`ImageMap::scan`] reads the image-assets directory once (flat, no
//! recursion) and maps each image's base name to its public reference:
//!
//! ```text
//! public/posts/2025.trip.png   →   "2025.trip" => "/public/posts/2025.trip.png"
//! public/posts/Trip.JPG        →   "trip"      => "/public/posts/Trip.JPG"
//! ```
//!
//! Base names are matched case-insensitively. When two files share a base
//! name (`a.png` and `a.webp`) the first in filename order wins.
//!
//! ## Lookup
//!
//! [`ImageMap::lookup`] accepts whatever an author typed into `ImageURL`:
//!
//! 1. `http://…` / `https://…`: trusted and returned verbatim.
//! 2. `/…`: an absolute site path, returned only if the file exists.
//! 3. Anything else: a base-name match on the full key, then on the key with
//!    its extension stripped, then on `<stripped>.<ext>` for each extension
//!    in [`EXTENSION_PRIORITY`].
//!
//! ## Fallback chains
//!
//! When a post has no usable `ImageURL`, or for folders, a chain of
//! name-derived candidates is tried in order and the first hit wins. The
//! chain is configurable (see [`CoverPrecedence`]); the defaults are:
//!
//! - **Post**: `folder.path.slug` → `folder.path` → `slug` → `last-folder`
//! - **Folder**: `folder.path` → `last-folder`

use crate::naming::{dotted, strip_extension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions recognised as images when scanning the assets directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Order in which extensions are appended when a bare name doesn't match.
pub const EXTENSION_PRIORITY: &[&str] = &["webp", "png", "jpg", "jpeg", "gif"];

/// One name-derived candidate in a cover fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverCandidate {
    /// Dotted folder path plus slug: `2025.trip`.
    DottedSlug,
    /// Dotted folder path: `2025.summer`.
    Dotted,
    /// The post slug alone.
    Slug,
    /// The last folder segment alone.
    LastSegment,
}

impl CoverCandidate {
    /// The image-map key this candidate proposes, if it applies here.
    ///
    /// Folder-derived candidates don't apply at the content root, and
    /// slug-derived ones don't apply to folders (`slug` is `None`).
    fn key(self, segments: &[String], slug: Option<&str>) -> Option<String> {
        match self {
            CoverCandidate::DottedSlug => {
                let slug = slug?;
                (!segments.is_empty()).then(|| format!("{}.{}", dotted(segments), slug))
            }
            CoverCandidate::Dotted => (!segments.is_empty()).then(|| dotted(segments)),
            CoverCandidate::Slug => slug.map(String::from),
            CoverCandidate::LastSegment => segments.last().cloned(),
        }
    }

    /// Whether the candidate can be evaluated for a folder (no slug).
    pub fn applies_to_folders(self) -> bool {
        matches!(self, CoverCandidate::Dotted | CoverCandidate::LastSegment)
    }
}

/// Ordered fallback chains for post and folder covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverPrecedence {
    pub file: Vec<CoverCandidate>,
    pub folder: Vec<CoverCandidate>,
}

impl Default for CoverPrecedence {
    fn default() -> Self {
        Self {
            file: vec![
                CoverCandidate::DottedSlug,
                CoverCandidate::Dotted,
                CoverCandidate::Slug,
                CoverCandidate::LastSegment,
            ],
            folder: vec![CoverCandidate::Dotted, CoverCandidate::LastSegment],
        }
    }
}

/// Case-insensitive base name → public reference lookup table.
#[derive(Debug, Clone, Default)]
pub struct ImageMap {
    entries: HashMap<String, String>,
    /// Directory that absolute `/…` references are checked against.
    site_root: Option<PathBuf>,
}

impl ImageMap {
    /// Build a map from explicit `(base name, reference)` pairs.
    ///
    /// Absolute-path lookups always miss on a map built this way.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::default();
        for (base, reference) in entries {
            map.insert(base.into(), reference.into());
        }
        map
    }

    /// Scan `site_root/images_dir` for images and map them to
    /// `/<public_prefix>/<filename>`.
    ///
    /// A missing directory yields an empty map rather than an error: a site
    /// without images still builds.
    pub fn scan(site_root: &Path, images_dir: &str, public_prefix: &str) -> Self {
        let mut map = Self {
            entries: HashMap::new(),
            site_root: Some(site_root.to_path_buf()),
        };
        let dir = site_root.join(images_dir);
        let Ok(read) = fs::read_dir(&dir) else {
            return map;
        };

        let mut names: Vec<String> = read
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| is_image_name(name))
            .collect();
        names.sort();

        let prefix = public_prefix.trim_matches('/');
        for name in names {
            let base = strip_extension(&name).to_string();
            map.insert(base, format!("/{prefix}/{name}"));
        }
        map
    }

    fn insert(&mut self, base: String, reference: String) {
        self.entries.entry(base.to_lowercase()).or_insert(reference);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, base: &str) -> Option<String> {
        self.entries.get(&base.to_lowercase()).cloned()
    }

    /// Resolve an author-supplied image key to a reference.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        if key.starts_with("http://") || key.starts_with("https://") {
            return Some(key.to_string());
        }
        if key.starts_with('/') {
            let root = self.site_root.as_ref()?;
            let candidate = root.join(key.trim_start_matches('/'));
            return candidate.is_file().then(|| key.to_string());
        }

        let base = strip_extension(key);
        self.get(key)
            .or_else(|| self.get(base))
            .or_else(|| {
                EXTENSION_PRIORITY
                    .iter()
                    .find_map(|ext| self.get(&format!("{base}.{ext}")))
            })
    }

    /// Cover for a post: explicit `ImageURL` first, then the fallback chain.
    pub fn resolve_file_cover(
        &self,
        image_url: Option<&str>,
        slug: &str,
        segments: &[String],
        precedence: &CoverPrecedence,
    ) -> Option<String> {
        if let Some(found) = image_url.and_then(|url| self.lookup(url)) {
            return Some(found);
        }
        precedence
            .file
            .iter()
            .filter_map(|c| c.key(segments, Some(slug)))
            .find_map(|key| self.lookup(&key))
    }

    /// Cover for a folder. The content root never has one.
    pub fn resolve_folder_cover(
        &self,
        segments: &[String],
        precedence: &CoverPrecedence,
    ) -> Option<String> {
        if segments.is_empty() {
            return None;
        }
        precedence
            .folder
            .iter()
            .filter_map(|c| c.key(segments, None))
            .find_map(|key| self.lookup(&key))
    }
}

/// Whether a filename carries one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        && strip_extension(name) != name
}
