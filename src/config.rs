//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the site root (next to `posts/` and `public/`) and is sparse: it only
//! needs the keys it wants to change, which are merged on top of the stock
//! defaults before deserializing.
//!
//! ```text
//! site/
//! ├── config.toml              # optional overrides
//! ├── posts/                   # markdown content + index.json
//! └── public/posts/            # cover images
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [content]
//! posts_dir = "posts"               # Markdown content root
//! images_dir = "public/posts"       # Cover image directory (flat)
//! public_prefix = "public/posts"    # URL prefix for image references
//! index_file = "posts/index.json"   # Where the index is written
//!
//! [covers]
//! file = ["dotted-slug", "dotted", "slug", "last-segment"]
//! folder = ["dotted", "last-segment"]
//!
//! [rebuild]
//! timeout_secs = 30                 # Deadline for one index rebuild
//! # command = ["npm", "run", "build:index"]   # External builder instead
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8888
//!
//! [auth]
//! admin_user = "admin"
//! token_ttl_secs = 3600
//!
//! [github]
//! # repo = "owner/name"             # Commit through the GitHub API
//! branch = "main"
//! ```
//!
//! ## Secrets
//!
//! Secrets never live in `config.toml`. They are read from the environment
//! by [`Secrets::from_env`]:
//!
//! | Variable            | Purpose                                   |
//! |---------------------|-------------------------------------------|
//! | `FOLIO_JWT_SECRET`  | HS256 signing key for admin sessions      |
//! | `FOLIO_ADMIN_PASS`  | Admin password                            |
//! | `GITHUB_TOKEN`      | Token for the GitHub contents API         |
//! | `FOLIO_ENV`         | `development` relaxes the two auth checks |
//!
//! Unknown keys are rejected to catch typos early.

use crate::images::CoverPrecedence;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Where content, images, and the index live.
    pub content: ContentConfig,
    /// Cover image fallback chains.
    pub covers: CoverPrecedence,
    /// Index rebuild deadline and optional external builder.
    pub rebuild: RebuildConfig,
    /// Admin server bind address.
    pub server: ServerConfig,
    /// Admin login settings (the password comes from the environment).
    pub auth: AuthConfig,
    /// GitHub-backed persistence (the token comes from the environment).
    pub github: GithubConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.posts_dir.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "content.posts_dir must not be empty".into(),
            ));
        }
        if self.content.index_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content.index_file must not be empty".into(),
            ));
        }
        if let Some(bad) = self.covers.folder.iter().find(|c| !c.applies_to_folders()) {
            return Err(ConfigError::Validation(format!(
                "covers.folder cannot use {bad:?}: folders have no slug"
            )));
        }
        if self.rebuild.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "rebuild.timeout_secs must be non-zero".into(),
            ));
        }
        if self.rebuild.command.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(ConfigError::Validation(
                "rebuild.command must name a program".into(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.token_ttl_secs must be non-zero".into(),
            ));
        }
        if let Some(repo) = &self.github.repo
            && repo.split('/').filter(|s| !s.is_empty()).count() != 2
        {
            return Err(ConfigError::Validation(format!(
                "github.repo must look like owner/name, got '{repo}'"
            )));
        }
        Ok(())
    }

    /// Content root relative to the site root, without slashes.
    pub fn posts_dir(&self) -> &str {
        self.content.posts_dir.trim_matches('/')
    }
}

/// Content layout inside the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    pub posts_dir: String,
    pub images_dir: String,
    /// Prefix of public image references (`/<prefix>/<file>`).
    pub public_prefix: String,
    pub index_file: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            posts_dir: "posts".into(),
            images_dir: "public/posts".into(),
            public_prefix: "public/posts".into(),
            index_file: "posts/index.json".into(),
        }
    }
}

/// Index rebuild settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebuildConfig {
    pub timeout_secs: u64,
    /// Program and arguments to run instead of the in-process builder,
    /// with the site root as working directory.
    pub command: Option<Vec<String>>,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            command: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8888,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub admin_user: String,
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_user: "admin".into(),
            token_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    /// `owner/name`. When set (and `GITHUB_TOKEN` is present) writes go to GitHub.
    pub repo: Option<String>,
    pub branch: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: None,
            branch: "main".into(),
        }
    }
}

/// Secret material read from the environment, never from `config.toml`.
#[derive(Clone, Default)]
pub struct Secrets {
    pub jwt_secret: Option<String>,
    pub admin_pass: Option<String>,
    pub github_token: Option<String>,
    /// `FOLIO_ENV=development`.
    pub development: bool,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<set>");
        f.debug_struct("Secrets")
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("admin_pass", &redact(&self.admin_pass))
            .field("github_token", &redact(&self.github_token))
            .field("development", &self.development)
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            jwt_secret: get("FOLIO_JWT_SECRET"),
            admin_pass: get("FOLIO_ADMIN_PASS"),
            github_token: get("GITHUB_TOKEN"),
            development: get("FOLIO_ENV").is_some_and(|v| v.eq_ignore_ascii_case("development")),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a
///   `covers.file` list replaces the default chain rather than extending it.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the site root, next to posts/ and public/.
# Unknown keys will cause an error.
#
# Secrets are read from the environment, never from this file:
#   FOLIO_JWT_SECRET   signing key for admin sessions (required)
#   FOLIO_ADMIN_PASS   admin password (required)
#   GITHUB_TOKEN       token for GitHub-backed persistence
#   FOLIO_ENV          set to "development" to run without the two above

# ---------------------------------------------------------------------------
# Content layout
# ---------------------------------------------------------------------------
[content]
# Directory holding the markdown posts. Subdirectories become folders.
posts_dir = "posts"

# Flat directory of cover images, matched to posts and folders by name:
#   2025.trip.png -> posts/2025/trip.md
#   2025.png      -> the posts/2025 folder
images_dir = "public/posts"

# Prefix used when writing image references into the index.
public_prefix = "public/posts"

# Where the generated index is written, relative to the site root.
index_file = "posts/index.json"

# ---------------------------------------------------------------------------
# Cover image fallback chains
# ---------------------------------------------------------------------------
# A post's ImageURL header always wins. When it is missing or doesn't
# resolve, these candidates are tried in order:
#   dotted-slug   folder path with dots, plus slug   (2025.trip)
#   dotted        folder path with dots              (2025)
#   slug          post slug                          (trip)
#   last-segment  innermost folder name              (2025)
# Folders have no slug, so only dotted and last-segment apply to them.
[covers]
file = ["dotted-slug", "dotted", "slug", "last-segment"]
folder = ["dotted", "last-segment"]

# ---------------------------------------------------------------------------
# Index rebuild
# ---------------------------------------------------------------------------
[rebuild]
# A rebuild that runs longer than this is abandoned and reported as timed out.
timeout_secs = 30

# Run an external program instead of the built-in index builder.
# It runs from the site root and is killed on timeout.
# command = ["npm", "run", "build:index"]

# ---------------------------------------------------------------------------
# Admin server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 8888

# ---------------------------------------------------------------------------
# Admin login
# ---------------------------------------------------------------------------
[auth]
admin_user = "admin"

# Lifetime of an issued session token.
token_ttl_secs = 3600

# ---------------------------------------------------------------------------
# GitHub-backed persistence
# ---------------------------------------------------------------------------
# With a repo set and GITHUB_TOKEN in the environment, admin writes are
# committed through the GitHub contents API instead of the local disk.
[github]
# repo = "owner/name"
branch = "main"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::CoverCandidate;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn stock_toml_parses_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value(), Some(value)).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.content.index_file, defaults.content.index_file);
        assert_eq!(config.covers, defaults.covers);
        assert_eq!(config.rebuild.timeout_secs, 30);
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.github.repo, None);
    }

    // =========================================================================
    // load_config()
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.content.posts_dir, "posts");
        assert_eq!(config.auth.token_ttl_secs, 3600);
    }

    #[test]
    fn load_config_merges_sparse_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[rebuild]
timeout_secs = 5

[github]
repo = "me/site"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.rebuild.timeout_secs, 5);
        assert_eq!(config.github.repo.as_deref(), Some("me/site"));
        // Unspecified values should be defaults
        assert_eq!(config.github.branch, "main");
        assert_eq!(config.content.images_dir, "public/posts");
    }

    #[test]
    fn covers_override_replaces_chain() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[covers]\nfile = [\"slug\"]\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.covers.file, vec![CoverCandidate::Slug]);
        assert_eq!(config.covers.folder, CoverPrecedence::default().folder);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[server]\nprot = 1\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // validate()
    // =========================================================================

    #[test]
    fn folder_chain_cannot_use_slug() {
        let mut config = SiteConfig::default();
        config.covers.folder = vec![CoverCandidate::Slug];
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut config = SiteConfig::default();
        config.rebuild.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_command_is_invalid() {
        let mut config = SiteConfig::default();
        config.rebuild.command = Some(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_repo_is_invalid() {
        let mut config = SiteConfig::default();
        config.github.repo = Some("just-a-name".into());
        assert!(config.validate().is_err());
        config.github.repo = Some("owner/name".into());
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // merge_toml()
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("timeout_secs = 30").unwrap();
        let overlay: toml::Value = toml::from_str("timeout_secs = 5").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("timeout_secs").unwrap().as_integer(), Some(5));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str("[x.y]\na = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[x.y]\nb = 3").unwrap();
        let merged = merge_toml(base, overlay);
        let y = merged.get("x").unwrap().get("y").unwrap();
        assert_eq!(y.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(y.get("b").unwrap().as_integer(), Some(3));
    }

    // =========================================================================
    // Secrets
    // =========================================================================

    #[test]
    fn secrets_from_lookup() {
        let secrets = Secrets::from_lookup(|key| match key {
            "FOLIO_JWT_SECRET" => Some("s3cret".into()),
            "FOLIO_ADMIN_PASS" => Some("   ".into()),
            "FOLIO_ENV" => Some("Development".into()),
            _ => None,
        });
        assert_eq!(secrets.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(secrets.admin_pass, None);
        assert_eq!(secrets.github_token, None);
        assert!(secrets.development);
    }

    #[test]
    fn secrets_debug_is_redacted() {
        let secrets = Secrets {
            jwt_secret: Some("s3cret".into()),
            ..Secrets::default()
        };
        let shown = format!("{secrets:?}");
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("<set>"));
    }
}
