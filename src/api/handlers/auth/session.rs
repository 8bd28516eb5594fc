//! Per-browser session state and the opaque cookie that keys it.
//!
//! The browser only ever holds a random token; the store is keyed by the
//! token's SHA-256 hash. All mutation happens under one mutex, so a reader
//! never observes a half-populated or half-cleared session. Expired entries
//! are pruned whenever the store is locked.

use anyhow::{Context, Result};
use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use base64::Engine;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::state::AuthConfig;

pub(crate) const SESSION_COOKIE_NAME: &str = "catalogo_session";

const LOGIN_STATE_LENGTH: usize = 32;

/// Authentication state for one browser session.
///
/// `is_authenticated` requires access token, subject, and display name
/// together; a subset would be a corrupt state and the store never produces
/// one.
#[derive(Clone, Debug, Default)]
pub struct Session {
    csrf_state: Option<String>,
    access_token: Option<String>,
    subject_id: Option<String>,
    display_name: Option<String>,
    email: Option<String>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.subject_id.is_some() && self.display_name.is_some()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Everything a successful callback learned about the user. Applied to the
/// session in one step.
#[derive(Clone, Debug)]
pub struct SessionIdentity {
    pub access_token: String,
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
}

struct SessionEntry {
    session: Session,
    created_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create an empty session and return the raw cookie token.
    /// Only the hash is kept server-side.
    /// # Errors
    /// Returns an error if the random generator fails.
    pub async fn issue(&self) -> Result<String> {
        let token = generate_session_token()?;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries.insert(
            hash_session_token(&token),
            SessionEntry {
                session: Session::default(),
                created_at: Instant::now(),
            },
        );
        Ok(token)
    }

    /// Copy of the session for the given cookie token, if it exists and has
    /// not expired.
    pub async fn snapshot(&self, token: &str) -> Option<Session> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries
            .get(&hash_session_token(token))
            .map(|entry| entry.session.clone())
    }

    /// Store the anti-CSRF state for a new login attempt, replacing any
    /// previous one. Returns false if the session is gone.
    pub async fn set_csrf(&self, token: &str, state: String) -> bool {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        match entries.get_mut(&hash_session_token(token)) {
            Some(entry) => {
                entry.session.csrf_state = Some(state);
                true
            }
            None => false,
        }
    }

    /// Remove and return the stored anti-CSRF state. The state is consumed
    /// on the callback whether or not it matches.
    pub async fn take_csrf(&self, token: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries
            .get_mut(&hash_session_token(token))
            .and_then(|entry| entry.session.csrf_state.take())
    }

    /// Set all identity fields in one step. Returns false if the session is
    /// gone.
    pub async fn populate(&self, token: &str, identity: SessionIdentity) -> bool {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        match entries.get_mut(&hash_session_token(token)) {
            Some(entry) => {
                entry.session.access_token = Some(identity.access_token);
                entry.session.subject_id = Some(identity.subject_id);
                entry.session.display_name = Some(identity.display_name);
                entry.session.email = Some(identity.email);
                true
            }
            None => false,
        }
    }

    /// Remove all identity fields in one step, keeping the session itself so
    /// the browser can log in again with the same cookie.
    pub async fn clear_auth(&self, token: &str) -> bool {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        match entries.get_mut(&hash_session_token(token)) {
            Some(entry) => {
                entry.session.access_token = None;
                entry.session.subject_id = None;
                entry.session.display_name = None;
                entry.session.email = None;
                true
            }
            None => false,
        }
    }
}

/// Fresh random state string tying a login attempt to this browser.
#[must_use]
pub(crate) fn generate_login_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LOGIN_STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the store keys by hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never sit in the store.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}
