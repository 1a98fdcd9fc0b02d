//! GitHub contents API store.
//!
//! Each write or delete is a commit on the configured branch. The `sha` the
//! API hands out is the git blob hash, and GitHub itself enforces the
//! optimistic-concurrency check: a stale or missing sha comes back as 409 or
//! 422 and is surfaced as [`StoreError::Conflict`].

use super::{Store, StoreError, StoredFile, clean_path};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.github.com";

pub struct GithubStore {
    api_base: String,
    repo: String,
    branch: String,
    token: String,
    client: Client,
}

#[derive(Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Deserialize)]
struct DirEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Deserialize)]
struct WrittenContent {
    sha: String,
}

impl GithubStore {
    pub fn new(repo: &str, branch: &str, token: String) -> Self {
        Self::with_api_base(API_BASE, repo, branch, token)
    }

    /// Point at a different API host (GitHub Enterprise, or a test server).
    pub fn with_api_base(api_base: &str, repo: &str, branch: &str, token: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.trim_matches('/').to_string(),
            branch: branch.to_string(),
            token,
            client: Client::new(),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base,
            self.repo,
            encoded.join("/")
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "folio")
    }

    async fn fetch(&self, path: &str) -> Result<Option<Response>, StoreError> {
        let resp = self
            .request(reqwest::Method::GET, &self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp, path).await?))
    }
}

/// Map a non-success response to a store error.
async fn check(resp: Response, path: &str) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(path.to_string())),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            debug!(path, %message, "github rejected sha");
            Err(StoreError::Conflict(path.to_string()))
        }
        _ => {
            warn!(path, status = status.as_u16(), %message, "github request failed");
            Err(StoreError::Remote {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl Store for GithubStore {
    async fn get_file(&self, path: &str) -> Result<StoredFile, StoreError> {
        let clean = clean_path(path)?;
        let Some(resp) = self.fetch(&clean).await? else {
            return Err(StoreError::NotFound(clean));
        };
        // A directory comes back as a JSON array and fails to parse here.
        let Ok(body) = resp.json::<ContentResponse>().await else {
            return Err(StoreError::NotFound(clean));
        };
        if body.kind != "file" {
            return Err(StoreError::NotFound(clean));
        }
        let packed: String = body.content.split_whitespace().collect();
        let content = STANDARD.decode(packed).map_err(|e| StoreError::Remote {
            status: 200,
            message: format!("undecodable content for {clean}: {e}"),
        })?;
        Ok(StoredFile {
            content,
            sha: body.sha,
        })
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError> {
        let clean = clean_path(path)?;
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let resp = self
            .request(reqwest::Method::PUT, &self.contents_url(&clean))
            .json(&body)
            .send()
            .await?;
        let resp = match check(resp, &clean).await {
            // Replacing a file that vanished: the sha no longer matches anything.
            Err(StoreError::NotFound(p)) if sha.is_some() => return Err(StoreError::Conflict(p)),
            other => other?,
        };
        let written: WriteResponse = resp.json().await?;
        debug!(path = %clean, "committed file");
        Ok(written.content.sha)
    }

    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> Result<(), StoreError> {
        let clean = clean_path(path)?;
        let body = json!({
            "message": message,
            "sha": sha,
            "branch": self.branch,
        });
        let resp = self
            .request(reqwest::Method::DELETE, &self.contents_url(&clean))
            .json(&body)
            .send()
            .await?;
        check(resp, &clean).await?;
        debug!(path = %clean, "deleted file");
        Ok(())
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut files = Vec::new();
        let mut pending = vec![clean_path(prefix)?];
        while let Some(dir) = pending.pop() {
            let Some(resp) = self.fetch(&dir).await? else {
                continue;
            };
            let Ok(entries) = resp.json::<Vec<DirEntry>>().await else {
                // A file, not a directory.
                files.push(dir);
                continue;
            };
            for entry in entries {
                match entry.kind.as_str() {
                    "dir" => pending.push(entry.path),
                    "file" => files.push(entry.path),
                    _ => {}
                }
            }
        }
        files.sort();
        Ok(files)
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self.get_file(path).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        format!("github:{}@{}", self.repo, self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as HttpStatus;
    use axum::response::{IntoResponse, Response as HttpResponse};
    use axum::routing::get;
    use serde_json::Value;
    use sha2::{Digest, Sha256};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    // =========================================================================
    // In-memory contents API
    // =========================================================================

    type Files = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;
    type Params = Path<(String, String, String)>;

    fn blob_sha(content: &[u8]) -> String {
        format!("{:x}", Sha256::digest(content))
    }

    fn reply(status: HttpStatus, body: Value) -> HttpResponse {
        (status, Json(body)).into_response()
    }

    async fn read(
        State(files): State<Files>,
        Path((_, _, path)): Params,
        Query(query): Query<HashMap<String, String>>,
    ) -> HttpResponse {
        if query.get("ref").map(String::as_str) == Some("broken") {
            return reply(HttpStatus::INTERNAL_SERVER_ERROR, json!({"message": "boom"}));
        }
        let files = files.lock().unwrap();
        if let Some(content) = files.get(&path) {
            // GitHub wraps the base64 payload across lines.
            let encoded = STANDARD.encode(content);
            let wrapped: Vec<&str> = encoded
                .as_bytes()
                .chunks(8)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect();
            return reply(
                HttpStatus::OK,
                json!({"sha": blob_sha(content), "content": wrapped.join("\n"), "type": "file"}),
            );
        }
        let dir = format!("{path}/");
        let mut entries = BTreeMap::new();
        for key in files.keys() {
            if let Some(rest) = key.strip_prefix(&dir) {
                match rest.split_once('/') {
                    Some((child, _)) => entries.insert(format!("{dir}{child}"), "dir"),
                    None => entries.insert(key.clone(), "file"),
                };
            }
        }
        if entries.is_empty() {
            return reply(HttpStatus::NOT_FOUND, json!({"message": "Not Found"}));
        }
        let listing: Vec<Value> = entries
            .into_iter()
            .map(|(path, kind)| json!({"path": path, "type": kind}))
            .collect();
        reply(HttpStatus::OK, Value::Array(listing))
    }

    async fn write(
        State(files): State<Files>,
        Path((_, _, path)): Params,
        Json(body): Json<Value>,
    ) -> HttpResponse {
        let mut files = files.lock().unwrap();
        let current = files.get(&path).map(|c| blob_sha(c));
        match (body["sha"].as_str(), current.as_deref()) {
            (None, Some(_)) => {
                return reply(HttpStatus::UNPROCESSABLE_ENTITY, json!({"message": "sha missing"}));
            }
            (Some(_), None) => return reply(HttpStatus::NOT_FOUND, json!({"message": "Not Found"})),
            (Some(given), Some(current)) if given != current => {
                return reply(HttpStatus::CONFLICT, json!({"message": "sha mismatch"}));
            }
            _ => {}
        }
        let content = STANDARD
            .decode(body["content"].as_str().unwrap_or_default())
            .unwrap();
        let sha = blob_sha(&content);
        files.insert(path, content);
        reply(HttpStatus::CREATED, json!({"content": {"sha": sha}}))
    }

    async fn remove(
        State(files): State<Files>,
        Path((_, _, path)): Params,
        Json(body): Json<Value>,
    ) -> HttpResponse {
        let mut files = files.lock().unwrap();
        let Some(current) = files.get(&path).map(|c| blob_sha(c)) else {
            return reply(HttpStatus::NOT_FOUND, json!({"message": "Not Found"}));
        };
        if body["sha"].as_str() != Some(current.as_str()) {
            return reply(HttpStatus::CONFLICT, json!({"message": "sha mismatch"}));
        }
        files.remove(&path);
        reply(HttpStatus::OK, json!({"commit": {}}))
    }

    /// Serve the given files on a local port; returns the store and the
    /// backing map.
    async fn mock_store(branch: &str, seed: &[(&str, &str)]) -> (GithubStore, Files) {
        let files: Files = Arc::new(Mutex::new(
            seed.iter()
                .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
                .collect(),
        ));
        let app = axum::Router::new()
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(read).put(write).delete(remove),
            )
            .with_state(files.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let store =
            GithubStore::with_api_base(&format!("http://{addr}"), "me/site", branch, "t".into());
        (store, files)
    }

    // =========================================================================
    // Request shape
    // =========================================================================

    #[test]
    fn contents_url_encodes_segments() {
        let store = GithubStore::with_api_base("http://api.test/", "me/site", "main", "t".into());
        assert_eq!(
            store.contents_url("posts/my trip/a.md"),
            "http://api.test/repos/me/site/contents/posts/my%20trip/a.md"
        );
    }

    #[test]
    fn describe_names_repo_and_branch() {
        let store = GithubStore::new("me/site", "drafts", "t".into());
        assert_eq!(store.describe(), "github:me/site@drafts");
    }

    // =========================================================================
    // get_file() / exists()
    // =========================================================================

    #[tokio::test]
    async fn get_file_decodes_wrapped_content() {
        let body = "<!-- $header -->\nTitle: \"Hello\"\n<!-- $/header -->\nHi\n";
        let (store, _) = mock_store("main", &[("posts/my trip/hello.md", body)]).await;

        let file = store.get_file("/posts/my trip/hello.md").await.unwrap();
        assert_eq!(file.content, body.as_bytes());
        assert_eq!(file.sha, blob_sha(body.as_bytes()));
        assert!(store.exists("posts/my trip/hello.md").await.unwrap());
    }

    #[tokio::test]
    async fn directory_or_missing_path_is_not_found() {
        let (store, _) = mock_store("main", &[("posts/travel/lisbon.md", "x")]).await;

        assert!(matches!(
            store.get_file("posts/travel").await,
            Err(StoreError::NotFound(p)) if p == "posts/travel"
        ));
        assert!(matches!(
            store.get_file("posts/nope.md").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.exists("posts/travel").await.unwrap());
        assert_eq!(store.current_sha("posts/nope.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_is_remote() {
        let (store, _) = mock_store("broken", &[("posts/a.md", "x")]).await;
        match store.get_file("posts/a.md").await {
            Err(StoreError::Remote { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("boom"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    // =========================================================================
    // put_file()
    // =========================================================================

    #[tokio::test]
    async fn put_creates_then_replaces_with_current_sha() {
        let (store, files) = mock_store("main", &[]).await;

        let first = store.put_file("posts/a.md", b"one", None, "Create").await.unwrap();
        assert_eq!(first, blob_sha(b"one"));
        let second = store
            .put_file("posts/a.md", b"two", Some(&first), "Update")
            .await
            .unwrap();
        assert_eq!(second, blob_sha(b"two"));
        assert_eq!(files.lock().unwrap()["posts/a.md"], b"two");
    }

    #[tokio::test]
    async fn put_with_stale_sha_is_conflict() {
        let (store, files) = mock_store("main", &[("posts/a.md", "theirs")]).await;
        let stale = blob_sha(b"mine");

        assert!(matches!(
            store.put_file("posts/a.md", b"new", Some(&stale), "Update").await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(files.lock().unwrap()["posts/a.md"], b"theirs");
    }

    #[tokio::test]
    async fn create_over_existing_file_is_conflict() {
        let (store, _) = mock_store("main", &[("posts/a.md", "theirs")]).await;
        assert!(matches!(
            store.put_file("posts/a.md", b"new", None, "Create").await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn replacing_a_vanished_file_is_conflict() {
        let (store, files) = mock_store("main", &[]).await;
        let old = blob_sha(b"old");
        assert!(matches!(
            store.put_file("posts/gone.md", b"new", Some(&old), "Update").await,
            Err(StoreError::Conflict(p)) if p == "posts/gone.md"
        ));
        assert!(files.lock().unwrap().is_empty());
    }

    // =========================================================================
    // delete_file()
    // =========================================================================

    #[tokio::test]
    async fn delete_requires_current_sha() {
        let (store, files) = mock_store("main", &[("posts/a.md", "body")]).await;

        assert!(matches!(
            store.delete_file("posts/a.md", &blob_sha(b"other"), "Delete").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(files.lock().unwrap().contains_key("posts/a.md"));

        store
            .delete_file("posts/a.md", &blob_sha(b"body"), "Delete")
            .await
            .unwrap();
        assert!(files.lock().unwrap().is_empty());

        assert!(matches!(
            store.delete_file("posts/a.md", &blob_sha(b"body"), "Delete").await,
            Err(StoreError::NotFound(_))
        ));
    }

    // =========================================================================
    // list_files()
    // =========================================================================

    #[tokio::test]
    async fn list_files_walks_subdirectories() {
        let (store, _) = mock_store(
            "main",
            &[
                ("posts/about.md", "a"),
                ("posts/travel/lisbon.md", "b"),
                ("posts/travel/japan/tokyo.md", "c"),
                ("public/posts/travel.png", "d"),
            ],
        )
        .await;

        assert_eq!(
            store.list_files("posts").await.unwrap(),
            vec![
                "posts/about.md",
                "posts/travel/japan/tokyo.md",
                "posts/travel/lisbon.md"
            ]
        );
        assert_eq!(
            store.list_files("/posts/travel/japan/").await.unwrap(),
            vec!["posts/travel/japan/tokyo.md"]
        );
        assert_eq!(
            store.list_files("posts/about.md").await.unwrap(),
            vec!["posts/about.md"]
        );
        assert!(store.list_files("drafts").await.unwrap().is_empty());
    }
}
