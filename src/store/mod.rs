//! Persistence for posts and images.
//!
//! Admin operations never touch the filesystem directly; they go through a
//! [`Store`], addressed by site-relative paths with forward slashes
//! (`posts/2025/trip.md`, `public/posts/cover.png`). Two stores exist:
//!
//! - [`LocalStore`] writes into a site directory on disk (development, or a
//!   self-hosted site).
//! - [`GithubStore`] commits through the GitHub contents API, so every admin
//!   edit becomes a commit and the hosting provider redeploys.
//!
//! ## Optimistic concurrency
//!
//! Every stored file has an opaque content hash (`sha`). Writers pass the
//! hash they last observed: `None` to create, `Some(sha)` to replace or
//! delete. If the file changed in between, the store rejects the write with
//! [`StoreError::Conflict`] and nothing is retried.

mod github;
mod local;

pub use github::GithubStore;
pub use local::LocalStore;

use crate::config::{Secrets, SiteConfig};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0} changed since it was read")]
    Conflict(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },
}

/// A file's bytes plus the hash that must accompany a write to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub sha: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Read a file. Missing files are [`StoreError::NotFound`].
    async fn get_file(&self, path: &str) -> Result<StoredFile, StoreError>;

    /// Create (`sha = None`) or replace a file; returns the new hash.
    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError>;

    /// Delete a file whose current hash is `sha`.
    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> Result<(), StoreError>;

    /// Every file below `prefix`, recursively, as store paths. A missing
    /// prefix lists nothing.
    async fn list_files(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Hash of the file at `path`, or `None` when it doesn't exist.
    async fn current_sha(&self, path: &str) -> Result<Option<String>, StoreError> {
        match self.get_file(path).await {
            Ok(file) => Ok(Some(file.sha)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Validate and normalize a store path.
///
/// Leading and trailing slashes are dropped; empty, `.` and `..` segments
/// are rejected so no path can escape the store root.
pub fn clean_path(path: &str) -> Result<String, StoreError> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || *p == "." || *p == ".." || p.contains('\\'))
    {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts.join("/"))
}

/// Pick the store for a site: GitHub when a repo is configured and a token
/// is present, the local site directory otherwise.
pub fn build_store(config: &SiteConfig, secrets: &Secrets, site_root: &Path) -> Arc<dyn Store> {
    let store: Arc<dyn Store> = match (&config.github.repo, &secrets.github_token) {
        (Some(repo), Some(token)) => Arc::new(GithubStore::new(
            repo,
            &config.github.branch,
            token.clone(),
        )),
        _ => Arc::new(LocalStore::new(site_root)),
    };
    info!(store = %store.describe(), "persistence ready");
    store
}
