//! Run Repository
//!
//! Handles all database operations for runs, stages, artifacts,
//! promotions, and scan reports.

use cascade_core::domain::artifact::Artifact;
use cascade_core::domain::promotion::PromotionRecord;
use cascade_core::domain::run::PipelineRun;
use cascade_core::domain::scan::ScanReport;
use cascade_core::domain::stage::Stage;
use sqlx::PgPool;
use uuid::Uuid;

use super::{enum_from_str, enum_to_str};

/// Insert a new run
pub async fn insert(pool: &PgPool, run: &PipelineRun) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO runs (
            id, repository, branch, commit_sha, trigger,
            target_environments, status, started_at, finished_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(run.id)
    .bind(&run.repository)
    .bind(&run.branch)
    .bind(&run.commit_sha)
    .bind(enum_to_str(&run.trigger)?)
    .bind(&run.target_environments)
    .bind(enum_to_str(&run.status)?)
    .bind(run.started_at)
    .bind(run.finished_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a run's mutable fields
pub async fn update(pool: &PgPool, run: &PipelineRun) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE runs
        SET target_environments = $1, status = $2, finished_at = $3
        WHERE id = $4
        "#,
    )
    .bind(&run.target_environments)
    .bind(enum_to_str(&run.status)?)
    .bind(run.finished_at)
    .bind(run.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a run by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PipelineRun>, sqlx::Error> {
    let row = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT id, repository, branch, commit_sha, trigger,
               target_environments, status, started_at, finished_at
        FROM runs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(PipelineRun::try_from).transpose()
}

/// List recent runs, most recent first
pub async fn list_recent(pool: &PgPool, limit: usize) -> Result<Vec<PipelineRun>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT id, repository, branch, commit_sha, trigger,
               target_environments, status, started_at, finished_at
        FROM runs
        ORDER BY started_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PipelineRun::try_from).collect()
}

/// Insert or update a stage record
pub async fn upsert_stage(pool: &PgPool, stage: &Stage) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stages (
            id, run_id, kind, environment, status, attempts,
            started_at, ended_at, classification
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status, attempts = EXCLUDED.attempts,
            started_at = EXCLUDED.started_at, ended_at = EXCLUDED.ended_at,
            classification = EXCLUDED.classification
        "#,
    )
    .bind(stage.id)
    .bind(stage.run_id)
    .bind(enum_to_str(&stage.kind)?)
    .bind(&stage.environment)
    .bind(enum_to_str(&stage.status)?)
    .bind(serde_json::to_value(&stage.attempts).map_err(|e| sqlx::Error::Encode(Box::new(e)))?)
    .bind(stage.started_at)
    .bind(stage.ended_at)
    .bind(
        stage
            .classification
            .as_ref()
            .map(enum_to_str)
            .transpose()?,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// List stages for a run, oldest first
pub async fn list_stages(pool: &PgPool, run_id: Uuid) -> Result<Vec<Stage>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, run_id, kind, environment, status, attempts,
               started_at, ended_at, classification
        FROM stages
        WHERE run_id = $1
        ORDER BY started_at ASC NULLS LAST
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Stage::try_from).collect()
}

/// Insert or replace a run's artifact
pub async fn upsert_artifact(
    pool: &PgPool,
    run_id: Uuid,
    artifact: &Artifact,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO artifacts (
            run_id, name, tag, digest, metadata, registry_location, state, deployed_to
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (run_id) DO UPDATE
        SET state = EXCLUDED.state, deployed_to = EXCLUDED.deployed_to
        "#,
    )
    .bind(run_id)
    .bind(&artifact.name)
    .bind(&artifact.tag)
    .bind(&artifact.digest)
    .bind(serde_json::to_value(&artifact.metadata).map_err(|e| sqlx::Error::Encode(Box::new(e)))?)
    .bind(&artifact.registry_location)
    .bind(enum_to_str(&artifact.state)?)
    .bind(&artifact.deployed_to)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a run's artifact
pub async fn find_artifact(pool: &PgPool, run_id: Uuid) -> Result<Option<Artifact>, sqlx::Error> {
    let row = sqlx::query_as::<_, ArtifactRow>(
        r#"
        SELECT run_id, name, tag, digest, metadata, registry_location, state, deployed_to
        FROM artifacts
        WHERE run_id = $1
        "#,
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    row.map(Artifact::try_from).transpose()
}

/// Write a promotion record to the audit log; a record opened pending
/// approval is settled in place when its decision lands
pub async fn insert_promotion(pool: &PgPool, record: &PromotionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO promotions (
            id, run_id, artifact_tag, artifact_digest, from_env, to_env,
            decision, block_reason, approver, requested_at, decided_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            decision = EXCLUDED.decision,
            block_reason = EXCLUDED.block_reason,
            approver = EXCLUDED.approver,
            decided_at = EXCLUDED.decided_at
        "#,
    )
    .bind(record.id)
    .bind(record.run_id)
    .bind(&record.artifact_tag)
    .bind(&record.artifact_digest)
    .bind(&record.from_env)
    .bind(&record.to_env)
    .bind(enum_to_str(&record.decision)?)
    .bind(record.block_reason.as_ref().map(enum_to_str).transpose()?)
    .bind(&record.approver)
    .bind(record.requested_at)
    .bind(record.decided_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a promotion record by ID
pub async fn find_promotion(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<PromotionRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, PromotionRow>(
        r#"
        SELECT id, run_id, artifact_tag, artifact_digest, from_env, to_env,
               decision, block_reason, approver, requested_at, decided_at
        FROM promotions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(PromotionRecord::try_from).transpose()
}

/// Store a scan report
pub async fn insert_scan(pool: &PgPool, report: &ScanReport) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO scan_reports (artifact_tag, critical_findings, total_findings, completed_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&report.artifact_tag)
    .bind(report.critical_findings as i32)
    .bind(report.total_findings as i32)
    .bind(report.completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent scan report for an artifact tag
pub async fn latest_scan(
    pool: &PgPool,
    artifact_tag: &str,
) -> Result<Option<ScanReport>, sqlx::Error> {
    let row = sqlx::query_as::<_, ScanRow>(
        r#"
        SELECT artifact_tag, critical_findings, total_findings, completed_at
        FROM scan_reports
        WHERE artifact_tag = $1
        ORDER BY completed_at DESC
        LIMIT 1
        "#,
    )
    .bind(artifact_tag)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ScanReport::from))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    repository: String,
    branch: String,
    commit_sha: String,
    trigger: String,
    target_environments: Vec<String>,
    status: String,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<RunRow> for PipelineRun {
    type Error = sqlx::Error;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(PipelineRun {
            id: row.id,
            repository: row.repository,
            branch: row.branch,
            commit_sha: row.commit_sha,
            trigger: enum_from_str(&row.trigger)?,
            target_environments: row.target_environments,
            status: enum_from_str(&row.status)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StageRow {
    id: Uuid,
    run_id: Uuid,
    kind: String,
    environment: Option<String>,
    status: String,
    attempts: serde_json::Value,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
    classification: Option<String>,
}

impl TryFrom<StageRow> for Stage {
    type Error = sqlx::Error;

    fn try_from(row: StageRow) -> Result<Self, Self::Error> {
        Ok(Stage {
            id: row.id,
            run_id: row.run_id,
            kind: enum_from_str(&row.kind)?,
            environment: row.environment,
            status: enum_from_str(&row.status)?,
            attempts: serde_json::from_value(row.attempts)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            started_at: row.started_at,
            ended_at: row.ended_at,
            classification: row
                .classification
                .as_deref()
                .map(enum_from_str)
                .transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    name: String,
    tag: String,
    digest: String,
    metadata: serde_json::Value,
    registry_location: String,
    state: String,
    deployed_to: Vec<String>,
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = sqlx::Error;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(Artifact {
            name: row.name,
            tag: row.tag,
            digest: row.digest,
            metadata: serde_json::from_value(row.metadata)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            registry_location: row.registry_location,
            state: enum_from_str(&row.state)?,
            deployed_to: row.deployed_to,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    run_id: Uuid,
    artifact_tag: String,
    artifact_digest: String,
    from_env: String,
    to_env: String,
    decision: String,
    block_reason: Option<String>,
    approver: Option<String>,
    requested_at: chrono::DateTime<chrono::Utc>,
    decided_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<PromotionRow> for PromotionRecord {
    type Error = sqlx::Error;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        Ok(PromotionRecord {
            id: row.id,
            run_id: row.run_id,
            artifact_tag: row.artifact_tag,
            artifact_digest: row.artifact_digest,
            from_env: row.from_env,
            to_env: row.to_env,
            decision: enum_from_str(&row.decision)?,
            block_reason: row
                .block_reason
                .as_deref()
                .map(enum_from_str)
                .transpose()?,
            approver: row.approver,
            requested_at: row.requested_at,
            decided_at: row.decided_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScanRow {
    artifact_tag: String,
    critical_findings: i32,
    total_findings: i32,
    completed_at: chrono::DateTime<chrono::Utc>,
}

impl From<ScanRow> for ScanReport {
    fn from(row: ScanRow) -> Self {
        ScanReport {
            artifact_tag: row.artifact_tag,
            critical_findings: row.critical_findings.max(0) as u32,
            total_findings: row.total_findings.max(0) as u32,
            completed_at: row.completed_at,
        }
    }
}
