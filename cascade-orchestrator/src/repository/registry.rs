//! Registry Repository
//!
//! Database-backed index of registry tag bindings. Rows are append-only;
//! the artifact ledger checks for an existing binding before publishing,
//! so a tag's digest is never rewritten here.

use sqlx::PgPool;
use std::collections::HashMap;

/// Digest currently bound to a tag, if any
pub async fn find_tag(pool: &PgPool, tag: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT digest FROM registry_tags WHERE tag = $1")
        .bind(tag)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(digest,)| digest))
}

/// Bind a tag to a digest with its metadata
pub async fn publish_tag(
    pool: &PgPool,
    tag: &str,
    digest: &str,
    metadata: &HashMap<String, String>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO registry_tags (tag, digest, metadata, published_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(tag)
    .bind(digest)
    .bind(serde_json::to_value(metadata).map_err(|e| sqlx::Error::Encode(Box::new(e)))?)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Read the metadata stored for a tag
pub async fn read_metadata(
    pool: &PgPool,
    tag: &str,
) -> Result<Option<HashMap<String, String>>, sqlx::Error> {
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT metadata FROM registry_tags WHERE tag = $1")
            .bind(tag)
            .fetch_optional(pool)
            .await?;

    row.map(|(value,)| {
        serde_json::from_value(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    })
    .transpose()
}
