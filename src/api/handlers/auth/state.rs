//! Auth configuration and shared per-process state.

use anyhow::Result;
use std::time::Duration;

use crate::cli::globals::GlobalArgs;

use super::{provider::ProviderClient, session::SessionStore};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_TOKEN_INFO_URL: &str = "https://www.googleapis.com/oauth2/v1/tokeninfo";
const DEFAULT_USER_INFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
const DEFAULT_REVOKE_URL: &str = "https://accounts.google.com/o/oauth2/revoke";

// The fixed redirect protocol marker for the browser-posted code flow.
const DEFAULT_REDIRECT_URI: &str = "postmessage";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_url: String,
    token_info_url: String,
    user_info_url: String,
    revoke_url: String,
    redirect_uri: String,
    session_ttl_seconds: u64,
    cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            token_info_url: DEFAULT_TOKEN_INFO_URL.to_string(),
            user_info_url: DEFAULT_USER_INFO_URL.to_string(),
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cookie_secure: true,
        }
    }

    #[must_use]
    pub fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_token_info_url(mut self, url: String) -> Self {
        self.token_info_url = url;
        self
    }

    #[must_use]
    pub fn with_user_info_url(mut self, url: String) -> Self {
        self.user_info_url = url;
        self
    }

    #[must_use]
    pub fn with_revoke_url(mut self, url: String) -> Self {
        self.revoke_url = url;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    #[must_use]
    pub fn token_info_url(&self) -> &str {
        &self.token_info_url
    }

    #[must_use]
    pub fn user_info_url(&self) -> &str {
        &self.user_info_url
    }

    #[must_use]
    pub fn revoke_url(&self) -> &str {
        &self.revoke_url
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: SessionStore,
    provider: ProviderClient,
}

impl AuthState {
    /// Build the shared auth state from config and the registered client
    /// credentials.
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: AuthConfig, globals: &GlobalArgs) -> Result<Self> {
        let provider = ProviderClient::new(&config, globals)?;
        let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_seconds()));
        Ok(Self {
            config,
            sessions,
            provider,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};
    use crate::cli::globals::GlobalArgs;
    use secrecy::SecretString;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();

        assert_eq!(config.token_url(), super::DEFAULT_TOKEN_URL);
        assert_eq!(config.token_info_url(), super::DEFAULT_TOKEN_INFO_URL);
        assert_eq!(config.user_info_url(), super::DEFAULT_USER_INFO_URL);
        assert_eq!(config.revoke_url(), super::DEFAULT_REVOKE_URL);
        assert_eq!(config.redirect_uri(), "postmessage");
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert!(config.cookie_secure());

        let config = config
            .with_token_url("http://localhost/token".to_string())
            .with_token_info_url("http://localhost/tokeninfo".to_string())
            .with_user_info_url("http://localhost/userinfo".to_string())
            .with_revoke_url("http://localhost/revoke".to_string())
            .with_session_ttl_seconds(60)
            .with_cookie_secure(false);

        assert_eq!(config.token_url(), "http://localhost/token");
        assert_eq!(config.token_info_url(), "http://localhost/tokeninfo");
        assert_eq!(config.user_info_url(), "http://localhost/userinfo");
        assert_eq!(config.revoke_url(), "http://localhost/revoke");
        assert_eq!(config.session_ttl_seconds(), 60);
        assert!(!config.cookie_secure());
    }

    #[test]
    fn auth_state_constructs() {
        let globals = GlobalArgs::new(
            "client-id".to_string(),
            SecretString::from("secret".to_string()),
        );
        let state = AuthState::new(AuthConfig::new().with_session_ttl_seconds(5), &globals)
            .expect("state should build");
        assert_eq!(state.config().session_ttl_seconds(), 5);
    }
}
