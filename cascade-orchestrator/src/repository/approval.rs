//! Approval Repository
//!
//! Handles database operations for approval requests. Persisting these is
//! what lets a suspended production promotion survive a restart.

use cascade_core::domain::promotion::{ApprovalRequest, ApprovalState};
use sqlx::PgPool;
use uuid::Uuid;

use super::{enum_from_str, enum_to_str};

/// Insert a new approval request
pub async fn insert(pool: &PgPool, request: &ApprovalRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO approvals (
            id, promotion_id, run_id, state, requested_at, expires_at, decided_at, approver
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(request.id)
    .bind(request.promotion_id)
    .bind(request.run_id)
    .bind(enum_to_str(&request.state)?)
    .bind(request.requested_at)
    .bind(request.expires_at)
    .bind(request.decided_at)
    .bind(&request.approver)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find an approval request by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ApprovalRequest>, sqlx::Error> {
    let row = sqlx::query_as::<_, ApprovalRow>(
        r#"
        SELECT id, promotion_id, run_id, state, requested_at, expires_at, decided_at, approver
        FROM approvals
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(ApprovalRequest::try_from).transpose()
}

/// Update an approval's decision fields
pub async fn update(pool: &PgPool, request: &ApprovalRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE approvals
        SET state = $1, decided_at = $2, approver = $3, expires_at = $4
        WHERE id = $5
        "#,
    )
    .bind(enum_to_str(&request.state)?)
    .bind(request.decided_at)
    .bind(&request.approver)
    .bind(request.expires_at)
    .bind(request.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// List approval requests still awaiting a decision
pub async fn list_pending(pool: &PgPool) -> Result<Vec<ApprovalRequest>, sqlx::Error> {
    let pending = enum_to_str(&ApprovalState::Requested)?;
    let rows = sqlx::query_as::<_, ApprovalRow>(
        r#"
        SELECT id, promotion_id, run_id, state, requested_at, expires_at, decided_at, approver
        FROM approvals
        WHERE state = $1
        ORDER BY requested_at ASC
        "#,
    )
    .bind(pending)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ApprovalRequest::try_from).collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    id: Uuid,
    promotion_id: Uuid,
    run_id: Uuid,
    state: String,
    requested_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    decided_at: Option<chrono::DateTime<chrono::Utc>>,
    approver: Option<String>,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = sqlx::Error;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        Ok(ApprovalRequest {
            id: row.id,
            promotion_id: row.promotion_id,
            run_id: row.run_id,
            state: enum_from_str(&row.state)?,
            requested_at: row.requested_at,
            expires_at: row.expires_at,
            decided_at: row.decided_at,
            approver: row.approver,
        })
    }
}
