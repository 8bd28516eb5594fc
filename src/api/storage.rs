//! Database schema and repository-style lookups for catalogs and items.
//!
//! All queries are raw SQL instrumented with a `db.query` span. Lookups
//! return `Option` so callers handle "not found" explicitly instead of
//! relying on the driver to error.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub catalog_id: Uuid,
    pub owner_id: Option<Uuid>,
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Create the tables on startup if they do not exist yet.
///
/// The unique index on `users.email` is load-bearing: it is the
/// serialization point for concurrent first-logins with the same email.
pub(crate) async fn ensure_schema(pool: &PgPool) -> Result<()> {
    let statements = [
        r"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        r"
        CREATE TABLE IF NOT EXISTS catalogs (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        r"
        CREATE TABLE IF NOT EXISTS items (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            catalog_id UUID NOT NULL REFERENCES catalogs (id),
            owner_id UUID REFERENCES users (id),
            UNIQUE (catalog_id, name)
        )",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .instrument(query_span("CREATE", statement))
            .await
            .context("failed to create schema")?;
    }

    Ok(())
}

/// Sample data so the read-only pages have content on first run.
/// Seeded items have no owner, so nobody can edit or delete them.
pub(crate) async fn seed(pool: &PgPool) -> Result<()> {
    let catalogs = [
        ("Basketball", vec![
            ("Hoop", "The ball goes in this."),
            ("Shoes", "Gotta love the Jordans."),
        ]),
        ("Baseball", vec![
            ("Bat", "You hit the ball with this."),
            ("Helmet", "Protects against the balls."),
        ]),
        ("Boxing", vec![
            ("Gloves", "Helps in punching."),
            ("Shorts", "Shorts!"),
        ]),
        ("Bowling", vec![
            ("Pins", "Gets hit by a ball."),
            ("Ball", "Use to hit the Pins."),
        ]),
        ("Badminton", vec![
            ("Racquet", "You hit the birdie with this."),
            ("Birdie", "Not a real bird."),
        ]),
    ];

    for (catalog_name, items) in catalogs {
        let query = r"
            INSERT INTO catalogs (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(catalog_name)
            .fetch_one(pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to seed catalog")?;
        let catalog_id: Uuid = row.get("id");

        for (item_name, description) in items {
            let query = r"
                INSERT INTO items (id, name, description, catalog_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (catalog_id, name) DO NOTHING
            ";
            sqlx::query(query)
                .bind(Uuid::new_v4())
                .bind(item_name)
                .bind(description)
                .bind(catalog_id)
                .execute(pool)
                .instrument(query_span("INSERT", query))
                .await
                .context("failed to seed item")?;
        }
    }

    Ok(())
}

pub(crate) async fn list_catalogs(pool: &PgPool) -> Result<Vec<CatalogRecord>> {
    let query = "SELECT id, name FROM catalogs ORDER BY name";
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to list catalogs")?;

    Ok(rows
        .into_iter()
        .map(|row| CatalogRecord {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

pub(crate) async fn find_catalog_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<CatalogRecord>> {
    let query = "SELECT id, name FROM catalogs WHERE name = $1";
    let row = sqlx::query(query)
        .bind(name)
        .fetch_optional(pool)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to lookup catalog")?;

    Ok(row.map(|row| CatalogRecord {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

pub(crate) async fn list_catalog_items(
    pool: &PgPool,
    catalog_id: Uuid,
) -> Result<Vec<ItemRecord>> {
    let query = r"
        SELECT id, name, description, catalog_id, owner_id
        FROM items
        WHERE catalog_id = $1
        ORDER BY name
    ";
    let rows = sqlx::query(query)
        .bind(catalog_id)
        .fetch_all(pool)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to list catalog items")?;

    Ok(rows.into_iter().map(item_from_row).collect())
}

pub(crate) async fn list_items(pool: &PgPool) -> Result<Vec<ItemRecord>> {
    let query = r"
        SELECT id, name, description, catalog_id, owner_id
        FROM items
        ORDER BY name
    ";
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to list items")?;

    Ok(rows.into_iter().map(item_from_row).collect())
}

pub(crate) async fn find_item_by_name(
    pool: &PgPool,
    catalog_id: Uuid,
    name: &str,
) -> Result<Option<ItemRecord>> {
    let query = r"
        SELECT id, name, description, catalog_id, owner_id
        FROM items
        WHERE catalog_id = $1 AND name = $2
    ";
    let row = sqlx::query(query)
        .bind(catalog_id)
        .bind(name)
        .fetch_optional(pool)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to lookup item")?;

    Ok(row.map(item_from_row))
}

pub(crate) async fn insert_item(
    pool: &PgPool,
    catalog_id: Uuid,
    owner_id: Uuid,
    name: &str,
    description: &str,
) -> Result<ItemRecord> {
    let query = r"
        INSERT INTO items (id, name, description, catalog_id, owner_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, description, catalog_id, owner_id
    ";
    let row = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(catalog_id)
        .bind(owner_id)
        .fetch_one(pool)
        .instrument(query_span("INSERT", query))
        .await
        .context("failed to insert item")?;

    Ok(item_from_row(row))
}

/// Update name and description. `owner_id` is immutable by design and is
/// never touched here.
pub(crate) async fn update_item(
    pool: &PgPool,
    item_id: Uuid,
    name: &str,
    description: &str,
) -> Result<()> {
    let query = r"
        UPDATE items
        SET name = $2, description = $3
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(item_id)
        .bind(name)
        .bind(description)
        .execute(pool)
        .instrument(query_span("UPDATE", query))
        .await
        .context("failed to update item")?;
    Ok(())
}

pub(crate) async fn delete_item(pool: &PgPool, item_id: Uuid) -> Result<()> {
    let query = "DELETE FROM items WHERE id = $1";
    sqlx::query(query)
        .bind(item_id)
        .execute(pool)
        .instrument(query_span("DELETE", query))
        .await
        .context("failed to delete item")?;
    Ok(())
}

fn item_from_row(row: sqlx::postgres::PgRow) -> ItemRecord {
    ItemRecord {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        catalog_id: row.get("catalog_id"),
        owner_id: row.get("owner_id"),
    }
}
