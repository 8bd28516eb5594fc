//! Item mutations: add, edit, delete. Every route here sits behind the
//! login gate; edit and delete additionally sit behind the ownership gate.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

use crate::api::storage::{self, CatalogRecord, ItemRecord};

use super::auth::{guard, AuthState};
use super::catalogs::{encode_segment, escape_html, not_found, page, storage_error};

#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn add_item_form(
    Path(catalog_name): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    if let Err(response) = guard::require_login(&auth, &headers, &pool).await {
        return response;
    }
    let catalog = match load_catalog(&pool, &catalog_name).await {
        Ok(catalog) => catalog,
        Err(response) => return response,
    };

    let body = format!(
        concat!(
            "<h1>Add item to {name}</h1>",
            "<form method=\"post\" action=\"/catalog/{href}/items/add\">",
            "<input name=\"name\" placeholder=\"Name\">",
            "<input name=\"description\" placeholder=\"Description\">",
            "<button type=\"submit\">Add</button>",
            "</form>"
        ),
        name = escape_html(&catalog.name),
        href = encode_segment(&catalog.name)
    );
    Html(page("Add item", &body, true)).into_response()
}

pub async fn add_item(
    Path(catalog_name): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Form(form): Form<ItemForm>,
) -> Response {
    let user = match guard::require_login(&auth, &headers, &pool).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let catalog = match load_catalog(&pool, &catalog_name).await {
        Ok(catalog) => catalog,
        Err(response) => return response,
    };

    match storage::insert_item(&pool, catalog.id, user.id, &form.name, &form.description).await {
        Ok(item) => {
            debug!(item_id = %item.id, owner_id = %user.id, "Item created");
            Redirect::to(&format!("/catalog/{}/items", encode_segment(&catalog.name)))
                .into_response()
        }
        Err(err) => storage_error(&err),
    }
}

pub async fn edit_item_form(
    Path((catalog_name, item_name)): Path<(String, String)>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    let user = match guard::require_login(&auth, &headers, &pool).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (catalog, item) = match load_item(&pool, &catalog_name, &item_name).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    if let Err(response) = guard::require_owner(&user, &item) {
        return response;
    }

    let body = format!(
        concat!(
            "<h1>Edit {item}</h1>",
            "<form method=\"post\" action=\"/catalog/{catalog}/items/{href}/edit\">",
            "<input name=\"name\" value=\"{item}\">",
            "<input name=\"description\" value=\"{description}\">",
            "<button type=\"submit\">Save</button>",
            "</form>"
        ),
        catalog = encode_segment(&catalog.name),
        href = encode_segment(&item.name),
        item = escape_html(&item.name),
        description = escape_html(item.description.as_deref().unwrap_or(""))
    );
    Html(page("Edit item", &body, true)).into_response()
}

pub async fn edit_item(
    Path((catalog_name, item_name)): Path<(String, String)>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Form(form): Form<ItemForm>,
) -> Response {
    let user = match guard::require_login(&auth, &headers, &pool).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (catalog, item) = match load_item(&pool, &catalog_name, &item_name).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    if let Err(response) = guard::require_owner(&user, &item) {
        return response;
    }

    // Blank fields keep the current value rather than erasing it.
    let name = effective(&form.name, &item.name);
    let description = effective(&form.description, item.description.as_deref().unwrap_or(""));

    if let Err(err) = storage::update_item(&pool, item.id, name, description).await {
        return storage_error(&err);
    }

    Redirect::to(&format!(
        "/catalog/{}/items/{}",
        encode_segment(&catalog.name),
        encode_segment(name)
    ))
    .into_response()
}

pub async fn delete_item_form(
    Path((catalog_name, item_name)): Path<(String, String)>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    let user = match guard::require_login(&auth, &headers, &pool).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (catalog, item) = match load_item(&pool, &catalog_name, &item_name).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    if let Err(response) = guard::require_owner(&user, &item) {
        return response;
    }

    let body = format!(
        concat!(
            "<h1>Delete {item}?</h1>",
            "<form method=\"post\" action=\"/catalog/{catalog}/items/{href}/delete\">",
            "<button type=\"submit\">Delete</button>",
            "</form>"
        ),
        catalog = encode_segment(&catalog.name),
        href = encode_segment(&item.name),
        item = escape_html(&item.name)
    );
    Html(page("Delete item", &body, true)).into_response()
}

pub async fn delete_item(
    Path((catalog_name, item_name)): Path<(String, String)>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Response {
    let user = match guard::require_login(&auth, &headers, &pool).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (catalog, item) = match load_item(&pool, &catalog_name, &item_name).await {
        Ok(found) => found,
        Err(response) => return response,
    };
    if let Err(response) = guard::require_owner(&user, &item) {
        return response;
    }

    if let Err(err) = storage::delete_item(&pool, item.id).await {
        return storage_error(&err);
    }

    debug!(item_id = %item.id, "Item deleted");
    Redirect::to(&format!("/catalog/{}/items", encode_segment(&catalog.name))).into_response()
}

async fn load_catalog(pool: &PgPool, name: &str) -> Result<CatalogRecord, Response> {
    match storage::find_catalog_by_name(pool, name).await {
        Ok(Some(catalog)) => Ok(catalog),
        Ok(None) => Err(not_found("catalog")),
        Err(err) => Err(storage_error(&err)),
    }
}

async fn load_item(
    pool: &PgPool,
    catalog_name: &str,
    item_name: &str,
) -> Result<(CatalogRecord, ItemRecord), Response> {
    let catalog = load_catalog(pool, catalog_name).await?;
    match storage::find_item_by_name(pool, catalog.id, item_name).await {
        Ok(Some(item)) => Ok((catalog, item)),
        Ok(None) => Err(not_found("item")),
        Err(err) => Err(storage_error(&err)),
    }
}

fn effective<'a>(submitted: &'a str, current: &'a str) -> &'a str {
    if submitted.trim().is_empty() {
        current
    } else {
        submitted
    }
}

#[cfg(test)]
mod tests {
    use super::{effective, encode_segment, ItemForm};
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Redirect},
    };

    #[test]
    fn form_description_defaults_to_empty() {
        let form: ItemForm = serde_urlencoded::from_str("name=Hoop").expect("deserialize");
        assert_eq!(form.name, "Hoop");
        assert_eq!(form.description, "");
    }

    #[test]
    fn form_parses_both_fields() {
        let form: ItemForm =
            serde_urlencoded::from_str("name=Hoop&description=Round").expect("deserialize");
        assert_eq!(form.name, "Hoop");
        assert_eq!(form.description, "Round");
    }

    #[test]
    fn blank_submission_keeps_current_value() {
        assert_eq!(effective("", "Hoop"), "Hoop");
        assert_eq!(effective("   ", "Hoop"), "Hoop");
        assert_eq!(effective("Net", "Hoop"), "Net");
    }

    #[test]
    fn redirect_survives_control_characters_in_item_name() {
        let target = format!(
            "/catalog/{}/items/{}",
            encode_segment("Basketball"),
            encode_segment("foo\nbar")
        );
        let response = Redirect::to(&target).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get("location")
            .expect("location header")
            .to_str()
            .expect("ascii location");
        assert_eq!(location, "/catalog/Basketball/items/foo%0Abar");
    }
}
