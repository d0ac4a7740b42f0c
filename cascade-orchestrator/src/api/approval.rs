//! Approval API Handlers
//!
//! HTTP endpoints for the human approval gate.

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use cascade_core::dto::promotion::{ApprovalDecision, ApprovalStatus};

use crate::api::error::{ApiError, ApiResult};
use crate::service::approval_service;
use crate::state::AppState;

fn map_err(err: approval_service::ApprovalError) -> ApiError {
    match err {
        approval_service::ApprovalError::NotFound(id) => {
            ApiError::NotFound(format!("Approval {} not found", id))
        }
        approval_service::ApprovalError::Validation(msg) => ApiError::BadRequest(msg),
        approval_service::ApprovalError::Engine(err) => ApiError::Engine(err),
    }
}

/// GET /api/approval/pending
/// List approval requests awaiting a decision
pub async fn list_pending_approvals(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ApprovalStatus>>> {
    tracing::debug!("Listing pending approvals");

    let pending = approval_service::list_pending(&state).await.map_err(map_err)?;
    Ok(Json(pending))
}

/// GET /api/approval/{id}
/// Get the status of an approval request
pub async fn get_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApprovalStatus>> {
    tracing::debug!("Getting approval: {}", id);

    let status = approval_service::get_approval(&state, id)
        .await
        .map_err(map_err)?;
    Ok(Json(status))
}

/// POST /api/approval/{id}/decide
/// Apply a human decision to a pending approval request
pub async fn decide_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApprovalDecision>,
) -> ApiResult<Json<ApprovalStatus>> {
    tracing::info!("Decision received for approval {}", id);

    let status = approval_service::decide_approval(&state, id, req)
        .await
        .map_err(map_err)?;
    Ok(Json(status))
}
