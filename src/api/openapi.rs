use axum::Json;
use utoipa::OpenApi;

use crate::api::handlers::{catalogs, health};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, catalogs::catalogs_json, catalogs::items_json),
    components(schemas(
        catalogs::CatalogJson,
        catalogs::ItemJson,
        catalogs::CatalogsResponse,
        catalogs::ItemsResponse
    )),
    tags(
        (name = "catalog", description = "Catalog and item exports"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn document_lists_public_routes() {
        let doc = openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/catalogs/json"));
        assert!(doc.paths.paths.contains_key("/items/json"));
    }
}
