//! Error taxonomy for the login callback.
//!
//! Every kind is fatal to the current login attempt and is reported to the
//! browser with a distinct message; none of them are retried server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The echoed `state` query parameter did not match the session.
    #[error("Invalid state parameter.")]
    InvalidState,

    /// The provider rejected the authorization code, or the exchange call
    /// itself failed (network error, timeout, malformed body).
    #[error("Failed to upgrade the authorization code.")]
    ExchangeFailed,

    /// The provider's token-info endpoint reported an error or was
    /// unreachable.
    #[error("{0}")]
    TokenInfo(String),

    /// Token-info subject differs from the identity token's subject claim.
    #[error("Token's user ID doesn't match given user ID.")]
    SubjectMismatch,

    /// The token was issued to a different client than this application.
    #[error("Token's client ID does not match app's.")]
    AudienceMismatch,
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        // Verification failures are treated as potential attacks, never as
        // server faults, so everything maps to 401.
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
