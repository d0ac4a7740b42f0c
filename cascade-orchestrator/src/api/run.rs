//! Run API Handlers
//!
//! HTTP endpoints for triggering and inspecting pipeline runs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use cascade_core::dto::promotion::PromoteRequest;
use cascade_core::dto::run::{RunDetail, RunSummary, SubmitScanReport, TriggerRun};

use crate::api::error::{ApiError, ApiResult};
use crate::service::run_service;
use crate::state::AppState;

fn map_err(err: run_service::RunError) -> ApiError {
    match err {
        run_service::RunError::NotFound(id) => ApiError::NotFound(format!("Run {} not found", id)),
        run_service::RunError::Engine(err) => ApiError::Engine(err),
    }
}

/// POST /api/run/trigger
/// Trigger a new pipeline run
pub async fn trigger_run(
    State(state): State<AppState>,
    Json(req): Json<TriggerRun>,
) -> ApiResult<(StatusCode, Json<RunSummary>)> {
    tracing::info!("Trigger requested: {}@{}", req.repository, req.branch);

    let summary = run_service::trigger_run(&state, req).await.map_err(map_err)?;

    Ok((StatusCode::ACCEPTED, Json(summary)))
}

/// GET /api/run/list
/// List recent runs
pub async fn list_runs(State(state): State<AppState>) -> ApiResult<Json<Vec<RunSummary>>> {
    tracing::debug!("Listing runs");

    let runs = run_service::list_runs(&state).await.map_err(map_err)?;
    Ok(Json(runs))
}

/// GET /api/run/{id}
/// Get run detail by ID
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunDetail>> {
    tracing::debug!("Getting run: {}", id);

    let detail = run_service::get_run(&state, id).await.map_err(map_err)?;
    Ok(Json(detail))
}

/// POST /api/run/{id}/promote
/// Manually promote a run's artifact into a target environment
pub async fn promote_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PromoteRequest>,
) -> ApiResult<Json<RunSummary>> {
    tracing::info!("Promotion of run {} to {} requested", id, req.to_env);

    let summary = run_service::promote_run(&state, id, req)
        .await
        .map_err(map_err)?;
    Ok(Json(summary))
}

/// POST /api/scan/report
/// Record a scan report for an artifact tag
pub async fn submit_scan_report(
    State(state): State<AppState>,
    Json(req): Json<SubmitScanReport>,
) -> ApiResult<StatusCode> {
    run_service::submit_scan_report(&state, req)
        .await
        .map_err(map_err)?;
    Ok(StatusCode::NO_CONTENT)
}
