use crate::{
    api::handlers::{auth, catalogs, health, items},
    cli::globals::GlobalArgs,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
pub(crate) mod storage;

mod openapi;
pub use openapi::openapi;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    globals: GlobalArgs,
    config: auth::AuthConfig,
    seed: bool,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    storage::ensure_schema(&pool)
        .await
        .context("Failed to create database schema")?;

    if seed {
        storage::seed(&pool)
            .await
            .context("Failed to seed sample data")?;
    }

    let auth_state = Arc::new(auth::AuthState::new(config, &globals)?);

    let app = router()
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn router() -> Router {
    Router::new()
        .route("/", get(catalogs::display_catalogs))
        .route("/catalog", get(catalogs::display_catalogs))
        .route("/login", get(auth::login::show_login))
        .route("/oauth2callback", post(auth::login::oauth2_callback))
        .route("/logout", get(auth::logout::logout))
        .route("/catalog/:catalog/items", get(catalogs::display_catalog_items))
        .route(
            "/catalog/:catalog/items/add",
            get(items::add_item_form).post(items::add_item),
        )
        .route(
            "/catalog/:catalog/items/:item",
            get(catalogs::display_catalog_item),
        )
        .route(
            "/catalog/:catalog/items/:item/edit",
            get(items::edit_item_form).post(items::edit_item),
        )
        .route(
            "/catalog/:catalog/items/:item/delete",
            get(items::delete_item_form).post(items::delete_item),
        )
        .route("/catalogs/json", get(catalogs::catalogs_json))
        .route("/items/json", get(catalogs::items_json))
        .route("/health", get(health::health).options(health::health))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
