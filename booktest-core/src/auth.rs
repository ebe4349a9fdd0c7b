//! Token-based authentication against the `/auth` endpoint, with a
//! process-wide cache so a suite does not re-authenticate on every call.
//!
//! The cache holds one token (single-credential suites); the mutex covers
//! the whole check-then-refresh sequence, so concurrent misses produce a
//! single login and every caller observes either the old or the new token.

use http::header::{HeaderMap, HeaderValue, COOKIE};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::*;

use crate::config::Config;

/// Validity window of a cached token.
const TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication failed with status: {status}")]
    Failed { status: u16 },
    #[error("no token received from auth endpoint")]
    MissingToken,
    #[error("token cannot be carried in a Cookie header")]
    InvalidToken,
    #[error("HttpError: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    acquired_at: Instant,
}

/// Serialized login request, shaped as the Restful Booker API expects.
#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Obtains and caches authentication tokens.
///
/// ```rust,ignore
/// let auth = AuthService::new(Config::shared())?;
/// let headers = auth.auth_headers()?; // Cookie: token=<value>
/// client.put("/booking/1").headers(headers).json(&data).send()?;
/// ```
pub struct AuthService {
    config: Arc<Config>,
    http: reqwest::blocking::Client,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl AuthService {
    pub fn new(config: Arc<Config>) -> Result<AuthService, AuthError> {
        AuthService::with_ttl(config, TOKEN_TTL)
    }

    /// Construct with a custom validity window. The default window is 30
    /// minutes; tests shrink it to probe the expiry boundary.
    pub fn with_ttl(config: Arc<Config>, ttl: Duration) -> Result<AuthService, AuthError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(AuthService {
            config,
            http,
            ttl,
            cached: Mutex::new(None),
        })
    }

    /// Return the cached token while it is inside the validity window,
    /// otherwise authenticate and cache the fresh token.
    pub fn token(&self) -> Result<String, AuthError> {
        // A poisoned lock only means another caller panicked mid-refresh;
        // the Option itself is still coherent.
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = cached.as_ref() {
            if entry.acquired_at.elapsed() < self.ttl {
                debug!("using cached auth token");
                return Ok(entry.token.clone());
            }
        }

        info!("authenticating to obtain new token");
        let token = self.login()?;
        *cached = Some(CachedToken {
            token: token.clone(),
            acquired_at: Instant::now(),
        });
        Ok(token)
    }

    /// Clear the cached token unconditionally, forcing the next
    /// [`AuthService::token`] call to re-authenticate.
    pub fn invalidate(&self) {
        info!("invalidating cached auth token");
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
    }

    /// The single header the Restful Booker API accepts a token in.
    pub fn auth_headers(&self) -> Result<HeaderMap, AuthError> {
        let token = self.token()?;
        let value = HeaderValue::from_str(&format!("token={token}"))
            .map_err(|_| AuthError::InvalidToken)?;
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, value);
        Ok(headers)
    }

    fn login(&self) -> Result<String, AuthError> {
        let base_url = self.config.base_url();
        let url = format!("{}/auth", base_url.trim_end_matches('/'));
        let username = self.config.auth_username();
        let password = self.config.auth_password();

        let response = self
            .http
            .post(&url)
            .json(&Credentials {
                username: &username,
                password: &password,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            error!("authentication failed with status: {status}");
            return Err(AuthError::Failed {
                status: status.as_u16(),
            });
        }

        let payload: AuthResponse = response.json()?;
        match payload.token {
            Some(token) if !token.is_empty() => {
                info!("authentication successful, token obtained");
                Ok(token)
            }
            _ => Err(AuthError::MissingToken),
        }
    }
}
