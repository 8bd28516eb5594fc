//! HTTP client for the identity provider: code exchange, token
//! verification, user info, and revocation.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::{api::APP_USER_AGENT, cli::globals::GlobalArgs};

use super::{error::AuthError, session::Session, state::AuthConfig};

// Bound for every outbound provider call; a hung provider must not pin a
// login request forever.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials returned by a successful code exchange.
#[derive(Clone, Debug)]
pub struct TokenBundle {
    pub access_token: String,
    /// `sub` claim of the identity token.
    pub subject: String,
}

/// Profile details fetched with a verified access token.
#[derive(Clone, Debug, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

/// Outcome of the verification handshake. `AlreadyConnected` is the benign
/// duplicate-login case, not an error.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    Verified,
    AlreadyConnected,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenInfoResponse {
    user_id: Option<String>,
    issued_to: Option<String>,
    error: Option<String>,
}

pub struct ProviderClient {
    http: Client,
    client_id: String,
    client_secret: SecretString,
    token_url: String,
    token_info_url: String,
    user_info_url: String,
    revoke_url: String,
    redirect_uri: String,
}

impl ProviderClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &AuthConfig, globals: &GlobalArgs) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(PROVIDER_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            client_id: globals.client_id.clone(),
            client_secret: globals.client_secret.clone(),
            token_url: config.token_url().to_string(),
            token_info_url: config.token_info_url().to_string(),
            user_info_url: config.user_info_url().to_string(),
            revoke_url: config.revoke_url().to_string(),
            redirect_uri: config.redirect_uri().to_string(),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchange the authorization code for an access token and the identity
    /// token's subject claim. Never mutates session state.
    #[instrument(skip(self, code))]
    pub async fn exchange(&self, code: &str) -> Result<TokenBundle, AuthError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                error!("Token exchange request failed: {err}");
                AuthError::ExchangeFailed
            })?;

        if !response.status().is_success() {
            debug!("Token exchange rejected with status {}", response.status());
            return Err(AuthError::ExchangeFailed);
        }

        let body: TokenResponse = response.json().await.map_err(|err| {
            error!("Token exchange returned malformed body: {err}");
            AuthError::ExchangeFailed
        })?;

        let subject = subject_claim(&body.id_token).ok_or_else(|| {
            error!("Identity token carried no subject claim");
            AuthError::ExchangeFailed
        })?;

        Ok(TokenBundle {
            access_token: body.access_token,
            subject,
        })
    }

    /// The four sequential verification checks. Short-circuits on the first
    /// failure; each check assumes the previous one passed.
    #[instrument(skip(self, bundle, session))]
    pub async fn verify(
        &self,
        bundle: &TokenBundle,
        session: &Session,
    ) -> Result<Verification, AuthError> {
        // 1. Ask the provider about the access token.
        let info = self.token_info(&bundle.access_token).await?;
        if let Some(message) = info.error {
            return Err(AuthError::TokenInfo(message));
        }

        // 2. The token must belong to the user named in the identity token.
        if info.user_id.as_deref() != Some(bundle.subject.as_str()) {
            return Err(AuthError::SubjectMismatch);
        }

        // 3. The token must have been issued to this application.
        if info.issued_to.as_deref() != Some(self.client_id.as_str()) {
            return Err(AuthError::AudienceMismatch);
        }

        // 4. Same subject already signed in on this session: benign no-op.
        if session.access_token().is_some()
            && session.subject_id() == Some(bundle.subject.as_str())
        {
            return Ok(Verification::AlreadyConnected);
        }

        Ok(Verification::Verified)
    }

    async fn token_info(&self, access_token: &str) -> Result<TokenInfoResponse, AuthError> {
        let response = self
            .http
            .get(&self.token_info_url)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|err| {
                error!("Token info request failed: {err}");
                AuthError::TokenInfo(format!("Token info request failed: {err}"))
            })?;

        // The provider reports token problems inside the body, sometimes with
        // a non-success status. Parse the body either way and let the error
        // field decide.
        response.json().await.map_err(|err| {
            error!("Token info returned malformed body: {err}");
            AuthError::TokenInfo(format!("Token info returned malformed body: {err}"))
        })
    }

    /// Fetch display name and email for a verified access token.
    #[instrument(skip(self, access_token))]
    pub async fn user_info(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let response = self
            .http
            .get(&self.user_info_url)
            .query(&[("access_token", access_token), ("alt", "json")])
            .send()
            .await
            .map_err(|err| {
                error!("User info request failed: {err}");
                AuthError::TokenInfo(format!("User info request failed: {err}"))
            })?;

        if !response.status().is_success() {
            debug!("User info rejected with status {}", response.status());
            return Err(AuthError::TokenInfo(format!(
                "User info rejected with status {}",
                response.status()
            )));
        }

        response.json().await.map_err(|err| {
            error!("User info returned malformed body: {err}");
            AuthError::TokenInfo(format!("User info returned malformed body: {err}"))
        })
    }

    /// Ask the provider to revoke the access token. The caller decides what
    /// to do with the session; this call never touches it.
    #[instrument(skip(self, access_token))]
    pub async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .get(&self.revoke_url)
            .query(&[("token", access_token)])
            .send()
            .await
            .context("revoke request failed")?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!(
                "revoke rejected with status {}",
                response.status()
            ))
        }
    }
}

/// Extract the `sub` claim from the identity token payload.
///
/// The signature is deliberately not checked here: authenticity is
/// established by cross-checking the subject against the provider's
/// token-info record, which only the provider can answer for.
pub(crate) fn subject_claim(id_token: &str) -> Option<String> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.as_bytes())
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("sub")?.as_str().map(str::to_string)
}
