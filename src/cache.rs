//! Folder cover probe cache.
//!
//! The index already carries a cover for every folder, but it is only as
//! fresh as the last rebuild. Right after an upload (or when the content
//! lives on GitHub and rebuilds happen in CI) the admin UI asks the store
//! directly whether a folder has an image. Each such question costs up to
//! ten existence checks, which against the GitHub API are ten HTTP calls,
//! so answers are memoized here.
//!
//! # Design
//!
//! [`CoverCache`] is an explicit object, created once and shared by
//! reference; there is no global state. Entries are keyed by the folder's
//! dotted path (`travel.japan`) and hold a [`tokio::sync::OnceCell`]:
//!
//! - the first caller for a key runs the probe,
//! - concurrent callers for the same key await that same probe,
//! - later callers get the stored answer, including "no cover".
//!
//! ## Probe order
//!
//! `<images_dir>/<dotted>.<ext>` for each extension, then
//! `<images_dir>/<last>.<ext>`, with extensions in the order png, jpg, jpeg,
//! webp, gif. A store error on one candidate counts as a miss for that
//! candidate. A hit is reported under the public prefix, the same way the
//! index reports covers.
//!
//! ## Invalidation
//!
//! Any mutation that can add or remove an image calls
//! [`CoverCache::invalidate`], which drops every entry.

use crate::images::IMAGE_EXTENSIONS;
use crate::naming::dotted;
use crate::store::Store;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

type Slot = Arc<OnceCell<Option<String>>>;

pub struct CoverCache {
    store: Arc<dyn Store>,
    images_dir: String,
    public_prefix: String,
    slots: Mutex<HashMap<String, Slot>>,
    lookups: AtomicU32,
    probes: AtomicU32,
}

/// Lookup counters, for logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub probes: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.probes
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} probed ({} total)",
                self.hits,
                self.probes,
                self.total()
            )
        } else {
            write!(f, "{} probed", self.probes)
        }
    }
}

impl CoverCache {
    /// `images_dir` is where images live in the store (`public/posts`);
    /// `public_prefix` is the URL prefix covers are reported under.
    pub fn new(store: Arc<dyn Store>, images_dir: &str, public_prefix: &str) -> Self {
        Self {
            store,
            images_dir: images_dir.trim_matches('/').to_string(),
            public_prefix: public_prefix.trim_matches('/').to_string(),
            slots: Mutex::new(HashMap::new()),
            lookups: AtomicU32::new(0),
            probes: AtomicU32::new(0),
        }
    }

    /// Public path of the folder's cover image, if the store has one.
    pub async fn folder_cover(&self, segments: &[String]) -> Option<String> {
        let key = dotted(segments);
        if key.is_empty() {
            return None;
        }
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let slot = self.slot(&key);
        slot.get_or_init(|| async {
            self.probes.fetch_add(1, Ordering::Relaxed);
            let found = self.probe(&key, segments).await;
            debug!(key = %key, found = ?found, "probed folder cover");
            found
        })
        .await
        .clone()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.to_string()).or_default().clone()
    }

    async fn probe(&self, dotted_key: &str, segments: &[String]) -> Option<String> {
        let mut names = vec![dotted_key.to_string()];
        if let Some(last) = segments.last()
            && last != dotted_key
        {
            names.push(last.clone());
        }
        for name in &names {
            for ext in IMAGE_EXTENSIONS {
                let path = format!("{}/{name}.{ext}", self.images_dir);
                if let Ok(true) = self.store.exists(&path).await {
                    return Some(format!("/{}/{name}.{ext}", self.public_prefix));
                }
            }
        }
        None
    }

    /// Forget every cached answer.
    pub fn invalidate(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let probes = self.probes.load(Ordering::Relaxed);
        CacheStats {
            hits: lookups.saturating_sub(probes),
            probes,
        }
    }
}
