//! HTTP surface for the admin backend.
//!
//! All routes live under `/api`. Everything except `POST /api/login` needs
//! `Authorization: Bearer <token>`. Errors are JSON bodies of the form
//! `{"error": "<code>", "message": "<text>"}`.
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /api/login` | [`Authenticator::login`] |
//! | `POST /api/createOrUpdatePost` | [`Admin::create_or_update`] |
//! | `POST /api/deletePost` | [`Admin::delete_post`] |
//! | `POST /api/deleteFolder` | [`Admin::delete_folder`] |
//! | `POST /api/uploadImage` | [`Admin::upload_image`] |
//! | `GET /api/getPost?path=` | [`Admin::get_post`] |
//! | `GET /api/listFolders` | [`Admin::list_folders`] |
//! | `POST /api/rebuildIndex` | [`Admin::rebuild_index`] |
//! | `GET /api/folderCover?path=` | [`Admin::folder_cover`] |

use crate::admin::{Admin, AdminError, ImageUpload, PostRequest};
use crate::auth::{AuthError, Authenticator, Claims};
use crate::config::{Secrets, SiteConfig};
use crate::rebuild::Rebuilder;
use crate::store::{self, StoreError};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid listen address {0}")]
    Address(String),
}

#[derive(Clone)]
pub struct AppState {
    pub admin: Arc<Admin>,
    pub auth: Arc<Authenticator>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        error_response(status, self.code(), &self.to_string())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AdminError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AdminError::Decode(_) => (StatusCode::BAD_REQUEST, "undecodable"),
            AdminError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AdminError::Persistence(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AdminError::Persistence(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            AdminError::Persistence(StoreError::InvalidPath(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_path")
            }
            AdminError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AdminError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
        };
        if status.is_server_error() {
            warn!(error = %self, "admin request failed");
        }
        error_response(status, code, &self.to_string())
    }
}

/// Extractor that admits only requests with a valid bearer token.
pub struct RequireAuth(pub Claims);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        state.auth.verify_header(header).map(RequireAuth)
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(alias = "username", default)]
    user: String,
    #[serde(alias = "password", default)]
    pass: String,
}

#[derive(Deserialize)]
struct PathQuery {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct DeletePostRequest {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct DeleteFolderRequest {
    #[serde(default)]
    folder: String,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/login", post(login))
        .route("/createOrUpdatePost", post(create_or_update_post))
        .route("/deletePost", post(delete_post))
        .route("/deleteFolder", post(delete_folder))
        .route("/uploadImage", post(upload_image))
        .route("/getPost", get(get_post))
        .route("/listFolders", get(list_folders))
        .route("/rebuildIndex", post(rebuild_index))
        .route("/folderCover", get(folder_cover));
    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    match state.auth.login(&req.user, &req.pass) {
        Ok(session) => {
            info!(user = %req.user, "admin logged in");
            Ok(Json(session).into_response())
        }
        Err(e) => {
            warn!(user = %req.user, "login rejected");
            Err(e)
        }
    }
}

async fn create_or_update_post(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<PostRequest>,
) -> Result<Response, AdminError> {
    let saved = state.admin.create_or_update(req).await?;
    Ok(Json(json!({ "ok": true, "path": saved.path, "created": saved.created, "build": saved.rebuild }))
        .into_response())
}

async fn delete_post(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<DeletePostRequest>,
) -> Result<Response, AdminError> {
    let deleted = state.admin.delete_post(&req.path).await?;
    Ok(Json(json!({ "ok": true, "path": deleted.path, "build": deleted.rebuild })).into_response())
}

async fn delete_folder(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<DeleteFolderRequest>,
) -> Result<Response, AdminError> {
    let deletion = state.admin.delete_folder(&req.folder).await?;
    Ok(Json(deletion).into_response())
}

async fn upload_image(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<ImageUpload>,
) -> Result<Response, AdminError> {
    let uploaded = state.admin.upload_image(req).await?;
    Ok(Json(json!({ "ok": true, "path": uploaded.path, "build": uploaded.rebuild })).into_response())
}

async fn get_post(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, AdminError> {
    Ok(Json(state.admin.get_post(&query.path).await?).into_response())
}

async fn list_folders(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
) -> Result<Response, AdminError> {
    let folders = state.admin.list_folders().await?;
    Ok(Json(json!({ "folders": folders })).into_response())
}

async fn rebuild_index(RequireAuth(_): RequireAuth, State(state): State<AppState>) -> Response {
    let outcome = state.admin.rebuild_index().await;
    Json(json!({ "ok": outcome.is_success(), "build": outcome })).into_response()
}

async fn folder_cover(
    RequireAuth(_): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Response {
    let cover = state.admin.folder_cover(&query.path).await;
    info!(stats = %state.admin.covers().stats(), "folder cover lookup");
    Json(cover).into_response()
}

/// Wire up store, rebuilder, and auth for a site.
pub fn app_state(
    config: &SiteConfig,
    secrets: &Secrets,
    site_root: &Path,
) -> Result<AppState, ServeError> {
    let auth = Authenticator::from_config(&config.auth, secrets)?;
    let store = store::build_store(config, secrets, site_root);
    let remote = config.github.repo.is_some() && secrets.github_token.is_some();
    let rebuilder = Rebuilder::for_site(config, site_root, remote);
    Ok(AppState {
        admin: Arc::new(Admin::new(store, rebuilder, config)),
        auth: Arc::new(auth),
    })
}

/// Serve the admin API until Ctrl+C or SIGTERM.
pub async fn serve(config: &SiteConfig, site_root: &Path) -> Result<(), ServeError> {
    let state = app_state(config, &Secrets::from_env(), site_root)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|_| ServeError::Address(format!("{}:{}", config.server.host, config.server.port)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "admin API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_of(err: AdminError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn admin_errors_map_to_statuses() {
        let cases = [
            (AdminError::Validation("Title required".into()), StatusCode::BAD_REQUEST),
            (AdminError::Decode("x".into()), StatusCode::BAD_REQUEST),
            (AdminError::NotFound("p".into()), StatusCode::NOT_FOUND),
            (StoreError::Conflict("p".into()).into(), StatusCode::CONFLICT),
            (StoreError::NotFound("p".into()).into(), StatusCode::NOT_FOUND),
            (StoreError::InvalidPath("..".into()).into(), StatusCode::BAD_REQUEST),
            (AdminError::Index("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = status_of(err).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn error_body_has_code_and_message() {
        let (_, body) = status_of(AdminError::Validation("Title required".into())).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(body["message"], "Title required");
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        assert_eq!(AuthError::Expired.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Missing.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Misconfigured("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn app_state_refuses_missing_secrets() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = app_state(&SiteConfig::default(), &Secrets::default(), tmp.path());
        assert!(matches!(result, Err(ServeError::Auth(AuthError::Misconfigured(_)))));
    }
}
