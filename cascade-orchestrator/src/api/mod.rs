//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod approval;
pub mod environment;
pub mod error;
pub mod health;
pub mod run;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Run endpoints
        .route("/api/run/trigger", post(run::trigger_run))
        .route("/api/run/list", get(run::list_runs))
        .route("/api/run/{id}", get(run::get_run))
        .route("/api/run/{id}/promote", post(run::promote_run))
        // Scan report ingestion
        .route("/api/scan/report", post(run::submit_scan_report))
        // Approval endpoints
        .route("/api/approval/pending", get(approval::list_pending_approvals))
        .route("/api/approval/{id}", get(approval::get_approval))
        .route("/api/approval/{id}/decide", post(approval::decide_approval))
        // Environment endpoints
        .route("/api/environment/list", get(environment::list_environments))
        .route(
            "/api/environment/rollback",
            post(environment::rollback_environment),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
