//! Bounded index rebuilds.
//!
//! Every admin mutation ends with a rebuild of the index. A rebuild is a
//! separate task with a deadline, and its result is a value
//! ([`RebuildOutcome`]) rather than an error: a mutation whose write
//! succeeded still succeeds when the rebuild after it fails or times out.
//!
//! Two builders exist:
//!
//! - **In-process** (default): [`scan::scan_site`] on a blocking thread. Only the
//!   scan runs under the deadline. A scan that finishes in time is always
//!   written out and reported as a success; a late scan is dropped, so a
//!   timed-out build never publishes anything.
//! - **External command** (`[rebuild] command`): run from the site root and
//!   killed when the deadline passes. The index it writes is read back to
//!   report counts.
//!
//! When the content lives on GitHub and there is no local checkout to scan,
//! rebuilds report a failure; the site's CI is expected to rebuild instead.

use crate::config::SiteConfig;
use crate::scan::{self, ScanError};
use crate::types::FolderNode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// How a rebuild ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RebuildOutcome {
    Success { files: usize, folders: usize },
    Failure { detail: String },
    TimedOut { after_secs: u64 },
}

impl RebuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RebuildOutcome::Success { .. })
    }
}

#[derive(Error, Debug)]
enum RebuildError {
    #[error("{0}")]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("rebuild command exited with {status}: {stderr}")]
    Command { status: String, stderr: String },
}

enum Builder {
    InProcess { site_root: PathBuf, config: SiteConfig },
    Command { argv: Vec<String>, site_root: PathBuf, index: PathBuf },
    Unavailable(String),
}

pub struct Rebuilder {
    builder: Builder,
    timeout: Duration,
}

impl Rebuilder {
    /// Rebuilder for a site checked out at `site_root`.
    ///
    /// `remote` is true when writes go to a remote store; the local directory
    /// is then only used if it actually holds the content root.
    pub fn for_site(config: &SiteConfig, site_root: &Path, remote: bool) -> Self {
        let timeout = Duration::from_secs(config.rebuild.timeout_secs);
        let has_checkout = site_root.join(config.posts_dir()).is_dir();
        let builder = if remote && !has_checkout {
            Builder::Unavailable("no local checkout to rebuild from".into())
        } else if let Some(argv) = &config.rebuild.command {
            Builder::Command {
                argv: argv.clone(),
                site_root: site_root.to_path_buf(),
                index: site_root.join(&config.content.index_file),
            }
        } else {
            Builder::InProcess {
                site_root: site_root.to_path_buf(),
                config: config.clone(),
            }
        };
        Self { builder, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one rebuild to completion or deadline.
    pub async fn run(&self) -> RebuildOutcome {
        let started = Instant::now();
        let result = match &self.builder {
            Builder::Unavailable(reason) => {
                warn!(%reason, "index rebuild skipped");
                return RebuildOutcome::Failure {
                    detail: reason.clone(),
                };
            }
            Builder::InProcess { site_root, config } => {
                match tokio::time::timeout(self.timeout, scan_in_background(site_root, config)).await
                {
                    Ok(Ok(tree)) => {
                        Ok(publish(tree, site_root.join(&config.content.index_file)).await)
                    }
                    Ok(Err(e)) => Ok(Err(e)),
                    Err(elapsed) => Err(elapsed),
                }
            }
            Builder::Command {
                argv,
                site_root,
                index,
            } => tokio::time::timeout(self.timeout, run_command(argv, site_root, index)).await,
        };

        match result {
            Ok(Ok((files, folders))) => {
                info!(files, folders, elapsed_ms = started.elapsed().as_millis() as u64, "index rebuilt");
                RebuildOutcome::Success { files, folders }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "index rebuild failed");
                RebuildOutcome::Failure {
                    detail: e.to_string(),
                }
            }
            Err(_) => {
                let after_secs = whole_secs(self.timeout);
                warn!(after_secs, "index rebuild timed out");
                RebuildOutcome::TimedOut { after_secs }
            }
        }
    }
}

/// Whole seconds, rounded up.
fn whole_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// Scan on a blocking thread. Dropping this future abandons the scan.
async fn scan_in_background(
    site_root: &Path,
    config: &SiteConfig,
) -> Result<FolderNode, RebuildError> {
    let root = site_root.to_path_buf();
    let scan_config = config.clone();
    Ok(tokio::task::spawn_blocking(move || scan::scan_site(&root, &scan_config)).await??)
}

async fn publish(tree: FolderNode, index: PathBuf) -> Result<(usize, usize), RebuildError> {
    let counts = (tree.file_count(), tree.folder_count());
    tokio::task::spawn_blocking(move || scan::write_index(&tree, &index)).await??;
    Ok(counts)
}

async fn run_command(
    argv: &[String],
    site_root: &Path,
    index: &Path,
) -> Result<(usize, usize), RebuildError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(RebuildError::Command {
            status: "not run".into(),
            stderr: "empty command".into(),
        });
    };
    let output = Command::new(program)
        .args(args)
        .current_dir(site_root)
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        return Err(RebuildError::Command {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let index = index.to_path_buf();
    let tree = tokio::task::spawn_blocking(move || scan::load_index(&index)).await??;
    Ok((tree.file_count(), tree.folder_count()))
}
