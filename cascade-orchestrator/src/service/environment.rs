//! Environment Service
//!
//! Business logic for environment inspection and manual rollback.

use cascade_core::domain::environment::Environment;
use cascade_core::dto::promotion::RollbackRequest;
use cascade_core::error::EngineError;

use crate::state::AppState;

/// Service error type
#[derive(Debug)]
pub enum EnvironmentError {
    NotFound(String),
    Engine(EngineError),
}

impl From<EngineError> for EnvironmentError {
    fn from(err: EngineError) -> Self {
        EnvironmentError::Engine(err)
    }
}

pub type Result<T> = std::result::Result<T, EnvironmentError>;

/// List all environments with their deployment state
pub async fn list_environments(state: &AppState) -> Result<Vec<Environment>> {
    let environments = state.environments.list().await?;
    Ok(environments)
}

/// Roll an environment back to its previous deployment
pub async fn rollback_environment(state: &AppState, req: RollbackRequest) -> Result<Environment> {
    if state.environments.fetch(&req.environment).await?.is_none() {
        return Err(EnvironmentError::NotFound(req.environment));
    }

    tracing::info!("Manual rollback requested for {}", req.environment);
    state.coordinator.manual_rollback(&req.environment).await?;

    // Re-read for the post-rollback pointer.
    state
        .environments
        .fetch(&req.environment)
        .await?
        .ok_or(EnvironmentError::NotFound(req.environment))
}
