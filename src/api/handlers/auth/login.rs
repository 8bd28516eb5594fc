//! Login page and the OAuth2 callback.

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    directory::upsert_user,
    error::AuthError,
    session::{extract_session_token, generate_login_state, session_cookie},
    state::AuthState,
    SessionIdentity, Verification,
};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
}

/// Serve the login page with a fresh anti-CSRF state, issuing the session
/// cookie if the browser does not have a live session yet.
pub async fn show_login(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
) -> Response {
    let live = match extract_session_token(&headers) {
        Some(token) => auth.sessions().snapshot(&token).await.map(|_| token),
        None => None,
    };
    let (mut token, mut fresh) = match live {
        Some(token) => (token, false),
        None => match auth.sessions().issue().await {
            Ok(token) => (token, true),
            Err(err) => {
                error!("Failed to issue session: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    let state = generate_login_state();
    if !auth.sessions().set_csrf(&token, state.clone()).await {
        // The session expired between the lookup and storing the state;
        // start over with a fresh one so the page never embeds a state the
        // store does not hold.
        token = match auth.sessions().issue().await {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to issue session: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        fresh = true;
        if !auth.sessions().set_csrf(&token, state.clone()).await {
            error!("Failed to store login state");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let mut response_headers = HeaderMap::new();
    if fresh {
        match session_cookie(auth.config(), &token) {
            Ok(cookie) => {
                response_headers.insert(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    (response_headers, Html(login_page(&state))).into_response()
}

/// Handle the authorization code the provider posted back.
///
/// Order matters: CSRF check before any network call, exchange before
/// verification, and the session/user directory are only written after every
/// check has passed.
pub async fn oauth2_callback(
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    code: String,
) -> Response {
    let Some(token) = extract_session_token(&headers) else {
        return AuthError::InvalidState.into_response();
    };

    // The stored state is consumed whether or not it matches; a failed
    // attempt must not leave a replayable state behind.
    let stored = auth.sessions().take_csrf(&token).await;
    if stored.is_none() || query.state != stored {
        return AuthError::InvalidState.into_response();
    }

    let bundle = match auth.provider().exchange(code.trim()).await {
        Ok(bundle) => bundle,
        // Exchange failures abort before the session was touched.
        Err(err) => return err.into_response(),
    };

    let session = auth
        .sessions()
        .snapshot(&token)
        .await
        .unwrap_or_default();

    let verification = match auth.provider().verify(&bundle, &session).await {
        Ok(verification) => verification,
        // A failed verification is treated as a potential attack: whatever
        // identity the session held is dropped along with the attempt.
        Err(err) => {
            auth.sessions().clear_auth(&token).await;
            return err.into_response();
        }
    };

    if verification == Verification::AlreadyConnected {
        return (
            StatusCode::OK,
            Json(json!({ "message": "Current user is already connected." })),
        )
            .into_response();
    }

    let profile = match auth.provider().user_info(&bundle.access_token).await {
        Ok(profile) => profile,
        Err(err) => {
            auth.sessions().clear_auth(&token).await;
            return err.into_response();
        }
    };

    let user = match upsert_user(&pool, &profile.email).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to upsert user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    debug!(user_id = %user.id, subject = %bundle.subject, "Login verified");

    let populated = auth
        .sessions()
        .populate(
            &token,
            SessionIdentity {
                access_token: bundle.access_token,
                subject_id: bundle.subject,
                display_name: profile.name.clone(),
                email: profile.email,
            },
        )
        .await;

    if !populated {
        // The session expired between the CSRF check and now.
        return AuthError::InvalidState.into_response();
    }

    (StatusCode::OK, Html(format!("Hi {}", profile.name))).into_response()
}

fn login_page(state: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><title>Login</title></head><body>",
            "<h1>Sign in</h1>",
            "<button id=\"signin\" data-state=\"{state}\">Sign in</button>",
            "</body></html>"
        ),
        state = state
    )
}
