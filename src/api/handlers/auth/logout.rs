//! Session teardown: revoke the access token with the provider, then clear
//! the session.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

use super::{session::extract_session_token, state::AuthState};

/// `GET /logout`.
///
/// Without an access token there is nothing to revoke and the caller is sent
/// back to the catalog list without any provider call. When the provider
/// rejects the revocation the session stays fully intact; the session is
/// only cleared after a confirmed revoke, so it is never left half-torn.
pub async fn logout(headers: HeaderMap, auth: Extension<Arc<AuthState>>) -> Response {
    let token = extract_session_token(&headers);

    let access_token = match &token {
        Some(token) => auth
            .sessions()
            .snapshot(token)
            .await
            .and_then(|session| session.access_token().map(str::to_string)),
        None => None,
    };

    let Some(access_token) = access_token else {
        debug!("Logout without an access token");
        return Redirect::to("/catalog").into_response();
    };

    match auth.provider().revoke(&access_token).await {
        Ok(()) => {
            if let Some(token) = &token {
                auth.sessions().clear_auth(token).await;
            }
            (
                StatusCode::OK,
                Json(json!({ "message": "Successfully disconnected." })),
            )
                .into_response()
        }
        Err(err) => {
            error!("Revoke token failed: {err}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Revoke token failed." })),
            )
                .into_response()
        }
    }
}
