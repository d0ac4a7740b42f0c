//! Error types for the Cascade client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Cascade client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// The engine taxonomy code the orchestrator attached to the error
    /// body, if any
    pub fn taxonomy_code(&self) -> Option<i32> {
        match self {
            Self::ApiError { message, .. } => serde_json::from_str::<serde_json::Value>(message)
                .ok()
                .and_then(|v| v.get("code").and_then(|c| c.as_i64()))
                .map(|c| c as i32),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_code_extracted_from_body() {
        let err = ClientError::api_error(409, r#"{"error":"promotion blocked","code":17}"#);
        assert_eq!(err.taxonomy_code(), Some(17));
    }

    #[test]
    fn test_taxonomy_code_absent_for_plain_body() {
        let err = ClientError::api_error(500, "Internal Server Error");
        assert_eq!(err.taxonomy_code(), None);
    }
}
