//! Filesystem-backed store rooted at a site directory.
//!
//! Hashes are SHA-256 of the file contents. Writes go to a temp file next to
//! the target and are renamed into place, so readers never see a half-written
//! post. Deleting the last file in a directory removes the emptied
//! directories too, matching how a git tree forgets empty folders.

use super::{Store, StoreError, StoredFile, clean_path};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

pub struct LocalStore {
    root: PathBuf,
}

/// SHA-256 of some bytes, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), StoreError> {
        let clean = clean_path(path)?;
        let full = self.root.join(&clean);
        Ok((clean, full))
    }

    async fn read_existing(&self, full: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove now-empty directories from `dir` up to (not including) the root.
    async fn prune_empty_dirs(&self, mut dir: &Path) {
        while dir != self.root && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            debug!(dir = %dir.display(), "removed empty directory");
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn get_file(&self, path: &str) -> Result<StoredFile, StoreError> {
        let (clean, full) = self.resolve(path)?;
        if fs::metadata(&full).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(StoreError::NotFound(clean));
        }
        match self.read_existing(&full).await? {
            Some(content) => Ok(StoredFile {
                sha: hash_bytes(&content),
                content,
            }),
            None => Err(StoreError::NotFound(clean)),
        }
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        _message: &str,
    ) -> Result<String, StoreError> {
        let (clean, full) = self.resolve(path)?;
        let current = self.read_existing(&full).await?.map(|b| hash_bytes(&b));
        if current.as_deref() != sha {
            return Err(StoreError::Conflict(clean));
        }

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = full.with_file_name(format!(
            ".{}.tmp",
            full.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        ));
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &full).await?;
        debug!(path = %clean, bytes = content.len(), "wrote file");
        Ok(hash_bytes(content))
    }

    async fn delete_file(&self, path: &str, sha: &str, _message: &str) -> Result<(), StoreError> {
        let (clean, full) = self.resolve(path)?;
        let Some(current) = self.read_existing(&full).await? else {
            return Err(StoreError::NotFound(clean));
        };
        if hash_bytes(&current) != sha {
            return Err(StoreError::Conflict(clean));
        }
        fs::remove_file(&full).await?;
        debug!(path = %clean, "deleted file");
        if let Some(parent) = full.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let (_, dir) = self.resolve(prefix)?;
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files: Vec<String> = WalkDir::new(&dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| {
                    let rel = e.path().strip_prefix(&root).ok()?;
                    let parts: Vec<String> = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().to_string())
                        .collect();
                    Some(parts.join("/"))
                })
                .collect();
            files.sort();
            files
        })
        .await
        .map_err(io::Error::other)?;
        Ok(files)
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let (_, full) = self.resolve(path)?;
        Ok(fs::metadata(&full).await.map(|m| m.is_file()).unwrap_or(false))
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}
