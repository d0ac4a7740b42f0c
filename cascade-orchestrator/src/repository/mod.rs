//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity.

pub mod approval;
pub mod environment;
pub mod registry;
pub mod run;

// Re-export for convenience
pub use approval as approval_repository;
pub use environment as environment_repository;
pub use registry as registry_repository;
pub use run as run_repository;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encodes a string-serialized enum for a VARCHAR column
pub(crate) fn enum_to_str<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(sqlx::Error::Encode(
            format!("expected string-encoded enum, got {other}").into(),
        )),
        Err(e) => Err(sqlx::Error::Encode(Box::new(e))),
    }
}

/// Decodes a VARCHAR column back into a string-serialized enum
pub(crate) fn enum_from_str<T: DeserializeOwned>(s: &str) -> Result<T, sqlx::Error> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::domain::run::RunStatus;

    #[test]
    fn test_enum_round_trips_through_varchar() {
        let encoded = enum_to_str(&RunStatus::Succeeded).unwrap();
        assert_eq!(encoded, "succeeded");
        let decoded: RunStatus = enum_from_str(&encoded).unwrap();
        assert_eq!(decoded, RunStatus::Succeeded);
    }

    #[test]
    fn test_unknown_variant_fails_decode() {
        let result: Result<RunStatus, _> = enum_from_str("exploded");
        assert!(result.is_err());
    }
}
