//! The two gates in front of mutating item routes.
//!
//! Gate one redirects anonymous callers to `/login` and never runs the
//! handler body. Gate two rejects non-owners with a visible `403` instead of
//! a redirect, so a signed-in user learns why the mutation was refused.
//! They are always evaluated in that order.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::api::storage::ItemRecord;

use super::{
    directory::{find_user_by_email, User},
    session::extract_session_token,
    state::AuthState,
};

/// Authentication gate: resolve the current user or produce the response
/// that ends the request.
///
/// Anything short of a fully authenticated session (no cookie, expired
/// entry, partially absent identity, unknown email) redirects to `/login`.
pub(crate) async fn require_login(
    auth: &AuthState,
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<User, Response> {
    let redirect = || Redirect::to("/login").into_response();

    let Some(token) = extract_session_token(headers) else {
        return Err(redirect());
    };
    let Some(session) = auth.sessions().snapshot(&token).await else {
        return Err(redirect());
    };
    if !session.is_authenticated() {
        return Err(redirect());
    }
    let Some(email) = session.email() else {
        return Err(redirect());
    };

    match find_user_by_email(pool, email).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(redirect()),
        Err(err) => {
            error!("Failed to resolve current user: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Ownership gate: only the creator of an item may mutate it.
/// Seeded items have no owner and fail for everyone.
pub(crate) fn require_owner(user: &User, item: &ItemRecord) -> Result<(), Response> {
    if item.owner_id == Some(user.id) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "You do not own this item." })),
        )
            .into_response())
    }
}

/// Whether the caller has a fully authenticated session. Used by the
/// read-only pages to pick the login/logout link.
pub(crate) async fn is_logged_in(auth: &AuthState, headers: &HeaderMap) -> bool {
    match extract_session_token(headers) {
        Some(token) => auth
            .sessions()
            .snapshot(&token)
            .await
            .is_some_and(|session| session.is_authenticated()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{require_owner, User};
    use crate::api::storage::ItemRecord;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn item(owner_id: Option<Uuid>) -> ItemRecord {
        ItemRecord {
            id: Uuid::new_v4(),
            name: "Hoop".to_string(),
            description: Some("The ball goes in this.".to_string()),
            catalog_id: Uuid::new_v4(),
            owner_id,
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
        }
    }

    #[test]
    fn owner_passes_the_gate() {
        let user = user();
        assert!(require_owner(&user, &item(Some(user.id))).is_ok());
    }

    #[test]
    fn non_owner_gets_forbidden() {
        let user = user();
        let response = require_owner(&user, &item(Some(Uuid::new_v4())))
            .expect_err("gate should reject a non-owner");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn ownerless_item_rejects_everyone() {
        let user = user();
        let response = require_owner(&user, &item(None)).expect_err("gate should reject");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
