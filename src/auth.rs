//! Admin authentication.
//!
//! There is a single admin. Logging in with the configured user name and
//! the `FOLIO_ADMIN_PASS` password yields an HS256 JWT; every other admin
//! request carries it as `Authorization: Bearer <token>`.
//!
//! Neither the signing secret nor the password has a built-in value. In
//! production both must come from the environment, and construction fails
//! with [`AuthError::Misconfigured`] otherwise. In development mode
//! (`FOLIO_ENV=development`) missing values are replaced with random ones
//! generated for this process, and a warning says so.

use crate::config::{AuthConfig, Secrets};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing or invalid Authorization header")]
    Missing,
    #[error("Invalid token")]
    Invalid,
    #[error("Token expired")]
    Expired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Server misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing_token",
            AuthError::Invalid => "invalid_token",
            AuthError::Expired => "token_expired",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Misconfigured(_) => "misconfigured",
        }
    }
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// A successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

pub struct Authenticator {
    user: String,
    pass_digest: Vec<u8>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("user", &self.user)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(user: &str, pass: &str, secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            user: user.to_string(),
            pass_digest: Sha256::digest(pass.as_bytes()).to_vec(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Build from config and environment secrets.
    pub fn from_config(config: &AuthConfig, secrets: &Secrets) -> Result<Self, AuthError> {
        let secret = match (&secrets.jwt_secret, secrets.development) {
            (Some(secret), _) => secret.as_bytes().to_vec(),
            (None, true) => {
                warn!("FOLIO_JWT_SECRET not set; using a random per-process secret (development mode)");
                let mut bytes = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
            (None, false) => {
                return Err(AuthError::Misconfigured("FOLIO_JWT_SECRET is not set".into()));
            }
        };
        let pass = match (&secrets.admin_pass, secrets.development) {
            (Some(pass), _) => pass.clone(),
            (None, true) => {
                let pass: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(16)
                    .map(char::from)
                    .collect();
                warn!(user = %config.admin_user, password = %pass, "FOLIO_ADMIN_PASS not set; generated a development password");
                pass
            }
            (None, false) => {
                return Err(AuthError::Misconfigured("FOLIO_ADMIN_PASS is not set".into()));
            }
        };
        Ok(Self::new(&config.admin_user, &pass, &secret, config.token_ttl_secs))
    }

    /// Check credentials and issue a token.
    pub fn login(&self, user: &str, pass: &str) -> Result<Session, AuthError> {
        let user_ok = Sha256::digest(user.as_bytes()) == Sha256::digest(self.user.as_bytes());
        let pass_ok = Sha256::digest(pass.as_bytes()).as_slice() == self.pass_digest.as_slice();
        if user.is_empty() || pass.is_empty() || !(user_ok & pass_ok) {
            return Err(AuthError::InvalidCredentials);
        }
        let now = now_secs();
        let claims = Claims {
            sub: user.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Misconfigured(e.to_string()))?;
        Ok(Session {
            token,
            expires_in: self.ttl_secs,
        })
    }

    /// Validate a token's signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }

    /// Validate an `Authorization` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header.and_then(bearer_token).ok_or(AuthError::Missing)?;
        self.verify(token)
    }
}

/// Extract the token from `Bearer <token>`. Anything else is `None`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
