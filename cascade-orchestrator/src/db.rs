use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create runs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            id UUID PRIMARY KEY,
            repository VARCHAR(255) NOT NULL,
            branch VARCHAR(255) NOT NULL,
            commit_sha VARCHAR(40) NOT NULL,
            trigger VARCHAR(50) NOT NULL,
            target_environments TEXT[] NOT NULL DEFAULT '{}',
            status VARCHAR(50) NOT NULL,
            started_at TIMESTAMPTZ NOT NULL,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create stages table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stages (
            id UUID PRIMARY KEY,
            run_id UUID NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            kind VARCHAR(50) NOT NULL,
            environment VARCHAR(255),
            status VARCHAR(50) NOT NULL,
            attempts JSONB NOT NULL DEFAULT '[]',
            started_at TIMESTAMPTZ,
            ended_at TIMESTAMPTZ,
            classification VARCHAR(50)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create artifacts table; one sealed artifact per run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            run_id UUID PRIMARY KEY REFERENCES runs(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            tag VARCHAR(255) NOT NULL,
            digest VARCHAR(255) NOT NULL,
            metadata JSONB NOT NULL DEFAULT '{}',
            registry_location VARCHAR(255) NOT NULL,
            state VARCHAR(50) NOT NULL,
            deployed_to TEXT[] NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Registry tag index; the (tag, digest) binding is append-only
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registry_tags (
            tag VARCHAR(255) PRIMARY KEY,
            digest VARCHAR(255) NOT NULL,
            metadata JSONB NOT NULL DEFAULT '{}',
            published_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create environments table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS environments (
            name VARCHAR(255) PRIMARY KEY,
            predecessors TEXT[] NOT NULL DEFAULT '{}',
            policy JSONB NOT NULL,
            deployed JSONB,
            version BIGINT NOT NULL DEFAULT 0,
            history JSONB NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create promotions table (append-only audit log)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS promotions (
            id UUID PRIMARY KEY,
            run_id UUID NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            artifact_tag VARCHAR(255) NOT NULL,
            artifact_digest VARCHAR(255) NOT NULL,
            from_env VARCHAR(255) NOT NULL,
            to_env VARCHAR(255) NOT NULL,
            decision VARCHAR(50) NOT NULL,
            block_reason VARCHAR(100),
            approver VARCHAR(255),
            requested_at TIMESTAMPTZ NOT NULL,
            decided_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create approvals table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS approvals (
            id UUID PRIMARY KEY,
            promotion_id UUID NOT NULL,
            run_id UUID NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            state VARCHAR(50) NOT NULL,
            requested_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            decided_at TIMESTAMPTZ,
            approver VARCHAR(255)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create scan reports table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_reports (
            id SERIAL PRIMARY KEY,
            artifact_tag VARCHAR(255) NOT NULL,
            critical_findings INTEGER NOT NULL,
            total_findings INTEGER NOT NULL,
            completed_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stages_run_id ON stages(run_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_promotions_run_id ON promotions(run_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_approvals_state ON approvals(state)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scan_reports_tag ON scan_reports(artifact_tag, completed_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
