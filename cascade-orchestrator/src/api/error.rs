//! API Error Handling
//!
//! Unified error types and conversion for API responses. Classified
//! engine errors carry their taxonomy code in the response body so
//! clients can surface it as an exit status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use cascade_core::error::EngineError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Engine(EngineError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Engine(err) => {
                let status = match &err {
                    EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                    EngineError::PolicyViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::Authentication(_) => StatusCode::UNAUTHORIZED,
                    EngineError::ImmutabilityViolation { .. }
                    | EngineError::PromotionBlocked { .. } => StatusCode::CONFLICT,
                    EngineError::Store(_) => {
                        tracing::error!("Store error: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let code = err.taxonomy_code();
                (status, err.to_string(), Some(code))
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
        };

        let body = match code {
            Some(code) => serde_json::json!({ "error": message, "code": code }),
            None => serde_json::json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
