//! Liveness endpoint
//!
//! Used by deploy tooling and load balancers to confirm the
//! orchestrator is serving requests.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "cascade-orchestrator: ok")
}
