//! # Folio
//!
//! Indexer and admin backend for a markdown blog that lives in a static
//! portfolio site. Posts are markdown files under `posts/` with a small
//! metadata header; images sit in `public/posts/`. Folio turns that tree into
//! one JSON index the site's client scripts read, and serves an
//! authenticated admin API that edits posts and rebuilds the index.
//!
//! # Architecture
//!
//! ```text
//! posts/ + public/posts/  ──scan──▶  posts/index.json  ──navigate──▶  views
//!          ▲                                 ▲
//!          └───── admin (store) ─────────────┘ rebuild after every write
//! ```
//!
//! The index is a snapshot: the scan builds a complete new tree and
//! publishes it by atomic rename, and readers never mutate it. Admin writes
//! go through a [`store::Store`] (local disk or the GitHub contents API) and
//! each is followed by a bounded rebuild whose outcome is reported, not
//! raised.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`header`] | `<!-- $header -->` metadata block codec |
//! | [`naming`] | Folder normalization, slugs, dotted keys, post filenames |
//! | [`images`] | Image map and configurable cover precedence |
//! | [`types`] | Index document types (`FolderNode`, `ContentFile`) |
//! | [`scan`] | Parallel tree builder, date parsing, index read/write |
//! | [`navigate`] | Path resolution, listings, search, sorting |
//! | [`config`] | `config.toml` loading, validation, environment secrets |
//! | [`store`] | Persistence trait with local and GitHub backends |
//! | [`rebuild`] | Deadline-bounded rebuilds with typed outcomes |
//! | [`cache`] | Memoized folder-cover probes against the store |
//! | [`auth`] | Admin login and JWT verification |
//! | [`admin`] | Admin operations: save, delete, upload, read, list |
//! | [`server`] | axum routes for the admin API |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Filesystem As Source Of Truth
//!
//! There is no database. The index is derived entirely from files, so it can
//! always be rebuilt from scratch, and a git push is a complete backup.
//!
//! ## No Built-In Secrets
//!
//! The JWT signing secret and the admin password come from the environment.
//! A server started without them refuses to run unless
//! `FOLIO_ENV=development`, in which case it generates throwaway values and
//! says so in the log.
//!
//! ## Cover Precedence Is Configuration
//!
//! Which image becomes a post's or folder's cover is an ordered list of
//! candidates in `[covers]`, not a hard-coded chain. See
//! [`images::CoverPrecedence`].

pub mod admin;
pub mod auth;
pub mod cache;
pub mod config;
pub mod header;
pub mod images;
pub mod logging;
pub mod naming;
pub mod navigate;
pub mod output;
pub mod rebuild;
pub mod scan;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
