//! Environment API Handlers
//!
//! HTTP endpoints for environment inspection and manual rollback.

use axum::{Json, extract::State};

use cascade_core::domain::environment::Environment;
use cascade_core::dto::promotion::RollbackRequest;

use crate::api::error::{ApiError, ApiResult};
use crate::service::environment_service;
use crate::state::AppState;

fn map_err(err: environment_service::EnvironmentError) -> ApiError {
    match err {
        environment_service::EnvironmentError::NotFound(name) => {
            ApiError::NotFound(format!("Environment '{}' not found", name))
        }
        environment_service::EnvironmentError::Engine(err) => ApiError::Engine(err),
    }
}

/// GET /api/environment/list
/// List all environments with their deployment state
pub async fn list_environments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Environment>>> {
    tracing::debug!("Listing environments");

    let environments = environment_service::list_environments(&state)
        .await
        .map_err(map_err)?;
    Ok(Json(environments))
}

/// POST /api/environment/rollback
/// Roll an environment back to its previous deployment
pub async fn rollback_environment(
    State(state): State<AppState>,
    Json(req): Json<RollbackRequest>,
) -> ApiResult<Json<Environment>> {
    tracing::info!("Rollback requested for {}", req.environment);

    let environment = environment_service::rollback_environment(&state, req)
        .await
        .map_err(map_err)?;
    Ok(Json(environment))
}
