//! Environment Repository
//!
//! Handles database operations for environment state, including the
//! version-guarded pointer update the promotion flow relies on.

use cascade_core::domain::environment::Environment;
use sqlx::PgPool;

/// Find an environment by name
pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Environment>, sqlx::Error> {
    let row = sqlx::query_as::<_, EnvironmentRow>(
        r#"
        SELECT name, predecessors, policy, deployed, version, history
        FROM environments
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(Environment::try_from).transpose()
}

/// List all environments by name
pub async fn list_all(pool: &PgPool) -> Result<Vec<Environment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EnvironmentRow>(
        r#"
        SELECT name, predecessors, policy, deployed, version, history
        FROM environments
        ORDER BY name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Environment::try_from).collect()
}

/// Insert or replace an environment
pub async fn upsert(pool: &PgPool, environment: &Environment) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO environments (name, predecessors, policy, deployed, version, history)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (name) DO UPDATE
        SET predecessors = EXCLUDED.predecessors, policy = EXCLUDED.policy,
            deployed = EXCLUDED.deployed, version = EXCLUDED.version,
            history = EXCLUDED.history
        "#,
    )
    .bind(&environment.name)
    .bind(&environment.predecessors)
    .bind(to_json(&environment.policy)?)
    .bind(environment.deployed.as_ref().map(to_json).transpose()?)
    .bind(environment.version as i64)
    .bind(to_json(&environment.history)?)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the environment only if the stored version still matches
///
/// Returns false when another writer got there first.
pub async fn compare_and_update(
    pool: &PgPool,
    environment: &Environment,
    expected_version: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE environments
        SET deployed = $1, version = $2, history = $3
        WHERE name = $4 AND version = $5
        "#,
    )
    .bind(environment.deployed.as_ref().map(to_json).transpose()?)
    .bind(environment.version as i64)
    .bind(to_json(&environment.history)?)
    .bind(&environment.name)
    .bind(expected_version as i64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Seed the default environment chain if the table is empty
pub async fn seed_defaults(pool: &PgPool) -> Result<(), sqlx::Error> {
    for environment in Environment::default_chain() {
        sqlx::query(
            r#"
            INSERT INTO environments (name, predecessors, policy, deployed, version, history)
            VALUES ($1, $2, $3, NULL, 0, '[]')
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&environment.name)
        .bind(&environment.predecessors)
        .bind(to_json(&environment.policy)?)
        .execute(pool)
        .await?;
    }

    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    name: String,
    predecessors: Vec<String>,
    policy: serde_json::Value,
    deployed: Option<serde_json::Value>,
    version: i64,
    history: serde_json::Value,
}

impl TryFrom<EnvironmentRow> for Environment {
    type Error = sqlx::Error;

    fn try_from(row: EnvironmentRow) -> Result<Self, Self::Error> {
        Ok(Environment {
            name: row.name,
            predecessors: row.predecessors,
            policy: serde_json::from_value(row.policy)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            deployed: row
                .deployed
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            version: row.version.max(0) as u64,
            history: serde_json::from_value(row.history)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        })
    }
}
