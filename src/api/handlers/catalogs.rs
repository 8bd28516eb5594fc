//! Read-only catalog and item pages plus the ungated JSON exports.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::{
    handlers::auth::{self, AuthState},
    storage,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogJson {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemJson {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub catalog_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogsResponse {
    #[serde(rename = "Catalog")]
    pub catalog: Vec<CatalogJson>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemsResponse {
    #[serde(rename = "Items")]
    pub items: Vec<ItemJson>,
}

pub async fn display_catalogs(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    let catalogs = match storage::list_catalogs(&pool).await {
        Ok(catalogs) => catalogs,
        Err(err) => return storage_error(&err),
    };

    let logged_in = auth::guard::is_logged_in(&auth, &headers).await;
    let rows: String = catalogs
        .iter()
        .map(|catalog| {
            format!(
                "<li><a href=\"/catalog/{href}/items\">{name}</a></li>",
                href = encode_segment(&catalog.name),
                name = escape_html(&catalog.name)
            )
        })
        .collect();

    Html(page(
        "Catalogs",
        &format!("<h1>Catalogs</h1><ul>{rows}</ul>"),
        logged_in,
    ))
    .into_response()
}

pub async fn display_catalog_items(
    Path(catalog_name): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    let catalog = match storage::find_catalog_by_name(&pool, &catalog_name).await {
        Ok(Some(catalog)) => catalog,
        Ok(None) => return not_found("catalog"),
        Err(err) => return storage_error(&err),
    };

    let items = match storage::list_catalog_items(&pool, catalog.id).await {
        Ok(items) => items,
        Err(err) => return storage_error(&err),
    };

    let logged_in = auth::guard::is_logged_in(&auth, &headers).await;
    let rows: String = items
        .iter()
        .map(|item| {
            format!(
                "<li><a href=\"/catalog/{catalog}/items/{href}\">{name}</a></li>",
                catalog = encode_segment(&catalog.name),
                href = encode_segment(&item.name),
                name = escape_html(&item.name)
            )
        })
        .collect();

    let body = format!(
        "<h1>{name} items</h1><ul>{rows}</ul><a href=\"/catalog/{href}/items/add\">Add item</a>",
        name = escape_html(&catalog.name),
        href = encode_segment(&catalog.name)
    );

    Html(page(&catalog.name, &body, logged_in)).into_response()
}

pub async fn display_catalog_item(
    Path((catalog_name, item_name)): Path<(String, String)>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    let catalog = match storage::find_catalog_by_name(&pool, &catalog_name).await {
        Ok(Some(catalog)) => catalog,
        Ok(None) => return not_found("catalog"),
        Err(err) => return storage_error(&err),
    };

    let item = match storage::find_item_by_name(&pool, catalog.id, &item_name).await {
        Ok(Some(item)) => item,
        Ok(None) => return not_found("item"),
        Err(err) => return storage_error(&err),
    };

    let logged_in = auth::guard::is_logged_in(&auth, &headers).await;
    let body = format!(
        "<h1>{name}</h1><p>{description}</p>",
        name = escape_html(&item.name),
        description = escape_html(item.description.as_deref().unwrap_or("")),
    );

    Html(page(&item.name, &body, logged_in)).into_response()
}

#[utoipa::path(
    get,
    path = "/catalogs/json",
    responses(
        (status = 200, description = "All catalogs", body = CatalogsResponse)
    ),
    tag = "catalog"
)]
pub async fn catalogs_json(pool: Extension<PgPool>) -> Response {
    match storage::list_catalogs(&pool).await {
        Ok(catalogs) => Json(CatalogsResponse {
            catalog: catalogs
                .into_iter()
                .map(|catalog| CatalogJson {
                    id: catalog.id,
                    name: catalog.name,
                })
                .collect(),
        })
        .into_response(),
        Err(err) => storage_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/items/json",
    responses(
        (status = 200, description = "All items", body = ItemsResponse)
    ),
    tag = "catalog"
)]
pub async fn items_json(pool: Extension<PgPool>) -> Response {
    match storage::list_items(&pool).await {
        Ok(items) => Json(ItemsResponse {
            items: items
                .into_iter()
                .map(|item| ItemJson {
                    id: item.id,
                    name: item.name,
                    description: item.description,
                    catalog_id: item.catalog_id,
                })
                .collect(),
        })
        .into_response(),
        Err(err) => storage_error(&err),
    }
}

pub(crate) fn page(title: &str, body: &str, logged_in: bool) -> String {
    let auth_link = if logged_in {
        "<a href=\"/logout\">Logout</a>"
    } else {
        "<a href=\"/login\">Login</a>"
    };
    format!(
        concat!(
            "<!DOCTYPE html><html><head><title>{title}</title></head><body>",
            "<nav><a href=\"/catalog\">Catalogs</a> {auth_link}</nav>",
            "{body}",
            "</body></html>"
        ),
        title = escape_html(title),
        auth_link = auth_link,
        body = body
    )
}

/// Percent-encode a catalog or item name for use as a URL path segment.
/// Names come from user input and may hold characters that are not legal in
/// a path or a `Location` header.
pub(crate) fn encode_segment(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("No such {what}.") })),
    )
        .into_response()
}

pub(crate) fn storage_error(err: &anyhow::Error) -> Response {
    error!("Storage error: {err}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
