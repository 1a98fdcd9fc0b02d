//! Admin mutation and read operations.
//!
//! These are the operations behind the admin UI. Each one is a short
//! sequential flow against the [`Store`]: read the current hash, write with
//! it, then rebuild the index. There is no locking between concurrent
//! operations; the store's hash check is the only guard, and a lost race
//! surfaces as a conflict.
//!
//! A rebuild is reported next to the result, never instead of it: when the
//! write succeeded the operation succeeded, whatever the rebuild did.
//!
//! ## Paths
//!
//! Post paths from the UI are loose. `/2025/trip.md`, `2025/trip.md`, and
//! `posts/2025/trip.md` all name the same file. [`Admin::delete_post`] is
//! looser still and will find a post by slug or path key through the index.

use crate::cache::CoverCache;
use crate::config::SiteConfig;
use crate::header::{self, Meta};
use crate::naming::{self, join_under, normalize_folder};
use crate::navigate::{find_file_loose, split_path};
use crate::rebuild::{RebuildOutcome, Rebuilder};
use crate::store::{Store, StoreError};
use crate::types::FolderNode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Index error: {0}")]
    Index(String),
}

/// Create-or-update input. Field names follow the admin UI's JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostRequest {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    pub filename: Option<String>,
    #[serde(alias = "folder")]
    pub location: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageUpload {
    pub folder: Option<String>,
    pub filename: Option<String>,
    /// Base64 image bytes, optionally as a `data:` URL.
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedPost {
    pub path: String,
    pub created: bool,
    pub rebuild: RebuildOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedPost {
    pub path: String,
    pub rebuild: RebuildOutcome,
}

/// Result for one file of a folder deletion.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderDeletion {
    pub folder: String,
    pub results: Vec<FileResult>,
    pub rebuild: RebuildOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    /// Public path to reference the image by, e.g. `/public/posts/trip/a.png`.
    pub path: String,
    pub rebuild: RebuildOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostContent {
    pub path: String,
    pub sha: String,
    pub content: String,
    pub meta: Meta,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderCover {
    pub folder: String,
    pub cover: Option<String>,
}

pub struct Admin {
    store: Arc<dyn Store>,
    rebuilder: Rebuilder,
    covers: CoverCache,
    posts_dir: String,
    images_dir: String,
    public_prefix: String,
    index_file: String,
}

impl Admin {
    pub fn new(store: Arc<dyn Store>, rebuilder: Rebuilder, config: &SiteConfig) -> Self {
        let images_dir = config.content.images_dir.trim_matches('/').to_string();
        Self {
            covers: CoverCache::new(store.clone(), &images_dir, &config.content.public_prefix),
            store,
            rebuilder,
            posts_dir: config.posts_dir().to_string(),
            images_dir,
            public_prefix: config.content.public_prefix.trim_matches('/').to_string(),
            index_file: config.content.index_file.trim_matches('/').to_string(),
        }
    }

    pub fn covers(&self) -> &CoverCache {
        &self.covers
    }

    /// Write a post and rebuild.
    pub async fn create_or_update(&self, req: PostRequest) -> Result<SavedPost, AdminError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(AdminError::Validation("Title required".into()));
        }
        let filename = naming::post_filename(req.filename.as_deref(), title, now_ms());
        if filename.contains('/') {
            return Err(AdminError::Validation(format!(
                "filename cannot contain '/': {filename}"
            )));
        }
        let folder = normalize_folder(req.location.as_deref().unwrap_or(""));
        let path = join_under(&self.posts_dir, &folder, &filename);

        let mut meta = Meta::new();
        meta.insert("Title".into(), title.to_string());
        let optional = [
            ("Description", Some(req.description.as_str())),
            ("ImageURL", req.image_url.as_deref()),
            ("Date", req.date.as_deref()),
        ];
        for (key, value) in optional {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                meta.insert(key.into(), value.to_string());
            }
        }
        let content = header::compose(&meta, &req.body);

        let sha = self.store.current_sha(&path).await?;
        let message = match sha {
            Some(_) => format!("Update post {path}"),
            None => format!("Create post {path}"),
        };
        self.store
            .put_file(&path, content.as_bytes(), sha.as_deref(), &message)
            .await?;
        info!(path = %path, created = sha.is_none(), "post saved");

        Ok(SavedPost {
            path,
            created: sha.is_none(),
            rebuild: self.rebuilder.run().await,
        })
    }

    /// Delete one post, located loosely, and rebuild.
    pub async fn delete_post(&self, path: &str) -> Result<DeletedPost, AdminError> {
        if path.trim().is_empty() {
            return Err(AdminError::Validation("path required".into()));
        }
        let mut target = self.post_path(path);
        let mut sha = self.store.current_sha(&target).await?;

        if sha.is_none()
            && let Some(index) = self.load_index().await?
            && let Some(found) = find_file_loose(&index, &target, &self.posts_dir)
        {
            sha = self.store.current_sha(&found).await?;
            target = found;
        }
        let Some(sha) = sha else {
            return Err(AdminError::NotFound(target));
        };

        match self
            .store
            .delete_file(&target, &sha, &format!("Delete post {target}"))
            .await
        {
            Err(StoreError::NotFound(p)) => return Err(AdminError::NotFound(p)),
            other => other?,
        }
        info!(path = %target, "post deleted");

        Ok(DeletedPost {
            path: target,
            rebuild: self.rebuilder.run().await,
        })
    }

    /// Delete every file under a folder, one by one, and rebuild.
    ///
    /// Failures are reported per file; files already deleted stay deleted.
    pub async fn delete_folder(&self, folder: &str) -> Result<FolderDeletion, AdminError> {
        let folder = normalize_folder(folder);
        if folder.is_empty() {
            return Err(AdminError::Validation("folder required".into()));
        }
        let prefix = join_under(&self.posts_dir, &folder, "");
        let files = self.store.list_files(&prefix).await?;
        if files.is_empty() {
            return Err(AdminError::NotFound(prefix));
        }

        let mut results = Vec::with_capacity(files.len());
        for path in files {
            let outcome = self.delete_one(&path).await;
            if let Err(e) = &outcome {
                warn!(path = %path, error = %e, "folder delete: file not removed");
            }
            results.push(FileResult {
                path,
                ok: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            });
        }
        let deleted = results.iter().filter(|r| r.ok).count();
        info!(folder = %prefix, deleted, total = results.len(), "folder deleted");

        Ok(FolderDeletion {
            folder: prefix,
            results,
            rebuild: self.rebuilder.run().await,
        })
    }

    async fn delete_one(&self, path: &str) -> Result<(), StoreError> {
        let sha = self
            .store
            .current_sha(path)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        self.store
            .delete_file(path, &sha, &format!("Delete {path}"))
            .await
    }

    /// Store an uploaded image and rebuild.
    pub async fn upload_image(&self, upload: ImageUpload) -> Result<UploadedImage, AdminError> {
        let encoded = upload.content.trim();
        if encoded.is_empty() {
            return Err(AdminError::Validation("No content provided".into()));
        }
        let bytes = decode_image(encoded)?;

        let folder = normalize_folder(upload.folder.as_deref().unwrap_or(""));
        let filename = match upload
            .filename
            .as_deref()
            .map(|f| f.trim().trim_start_matches('/'))
            .filter(|f| !f.is_empty())
        {
            Some(name) => name.to_string(),
            None => format!("{}.png", naming::base36(now_ms())),
        };
        let path = join_under(&self.images_dir, &folder, &filename);

        let sha = self.store.current_sha(&path).await?;
        let message = match sha {
            Some(_) => format!("Update image {path}"),
            None => format!("Add image {path}"),
        };
        self.store
            .put_file(&path, &bytes, sha.as_deref(), &message)
            .await?;
        self.covers.invalidate();
        info!(path = %path, bytes = bytes.len(), "image uploaded");

        Ok(UploadedImage {
            path: format!("/{}", join_under(&self.public_prefix, &folder, &filename)),
            rebuild: self.rebuilder.run().await,
        })
    }

    /// Read a post with its decoded header.
    pub async fn get_post(&self, path: &str) -> Result<PostContent, AdminError> {
        if path.trim().is_empty() {
            return Err(AdminError::Validation("path required".into()));
        }
        let target = self.post_path(path);
        let file = match self.store.get_file(&target).await {
            Err(StoreError::NotFound(p)) => return Err(AdminError::NotFound(p)),
            other => other?,
        };
        let content = String::from_utf8(file.content)
            .map_err(|_| AdminError::Decode(format!("{target} is not valid UTF-8")))?;
        let doc = header::decode(&content);
        Ok(PostContent {
            path: target,
            sha: file.sha,
            meta: doc.meta,
            body: doc.body,
            content,
        })
    }

    /// Every folder as `/a/`, `/a/b/`, parents first.
    ///
    /// Read from the index; when there is no usable index, derived from the
    /// files in the store.
    pub async fn list_folders(&self) -> Result<Vec<String>, AdminError> {
        let paths = match self.load_index().await {
            Ok(Some(index)) => index.folder_paths(),
            Ok(None) => self.folders_from_store().await?,
            Err(e) => {
                warn!(error = %e, "index unusable, listing folders from store");
                self.folders_from_store().await?
            }
        };
        Ok(paths.into_iter().map(|p| format!("/{p}/")).collect())
    }

    async fn folders_from_store(&self) -> Result<Vec<String>, AdminError> {
        let files = self.store.list_files(&self.posts_dir).await?;
        let marker = format!("{}/", self.posts_dir);
        let mut folders = BTreeSet::new();
        for file in &files {
            let Some(rel) = file.strip_prefix(&marker) else {
                continue;
            };
            let segments: Vec<&str> = rel.split('/').collect();
            for depth in 1..segments.len() {
                folders.insert(segments[..depth].join("/"));
            }
        }
        Ok(folders.into_iter().collect())
    }

    /// Run a rebuild on demand.
    pub async fn rebuild_index(&self) -> RebuildOutcome {
        self.rebuilder.run().await
    }

    /// Probe the store for a folder's cover image (memoized).
    pub async fn folder_cover(&self, folder: &str) -> FolderCover {
        let segments = split_path(folder, &self.posts_dir);
        FolderCover {
            cover: self.covers.folder_cover(&segments).await,
            folder: segments.join("/"),
        }
    }

    /// `posts/`-prefixed store path for a loosely written post path.
    fn post_path(&self, path: &str) -> String {
        let trimmed = path.trim().trim_start_matches('/');
        let marker = format!("{}/", self.posts_dir);
        if trimmed.starts_with(&marker) {
            trimmed.to_string()
        } else {
            format!("{marker}{trimmed}")
        }
    }

    async fn load_index(&self) -> Result<Option<FolderNode>, AdminError> {
        let file = match self.store.get_file(&self.index_file).await {
            Ok(file) => file,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&file.content)
            .map(Some)
            .map_err(|e| AdminError::Index(format!("{}: {e}", self.index_file)))
    }
}

/// Decode base64 image content, accepting a `data:…;base64,` prefix.
fn decode_image(encoded: &str) -> Result<Vec<u8>, AdminError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let packed: String = payload.split_whitespace().collect();
    STANDARD
        .decode(packed)
        .map_err(|e| AdminError::Decode(format!("image content is not base64: {e}")))
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
