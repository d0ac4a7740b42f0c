//! Engine error taxonomy
//!
//! Every stage-local error is classified into one of these variants before
//! it leaves the failure controller; the coordinator and the control
//! surface only ever see classified errors. Each variant maps to a stable
//! numeric taxonomy code used as the CLI exit status.

use thiserror::Error;

use crate::domain::promotion::BlockReason;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Classified engine failure
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Malformed workflow or input; hard fail, no retry
    #[error("validation failed: {0}")]
    Validation(String),

    /// A deny-severity policy rule matched
    #[error("policy violation [{rule}]: {message}")]
    PolicyViolation { rule: String, message: String },

    /// Credential exchange failed; hard fail
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A published tag was re-published with a different digest
    #[error("immutability violation: tag '{tag}' is bound to {existing}, refusing {attempted}")]
    ImmutabilityViolation {
        tag: String,
        existing: String,
        attempted: String,
    },

    /// Temporary infrastructure condition; retryable per stage policy
    #[error("transient infrastructure error: {0}")]
    TransientInfrastructure(String),

    /// Quota/config/permission problem; hard fail
    #[error("terminal infrastructure error: {0}")]
    TerminalInfrastructure(String),

    /// A verify stage failed; triggers rollback
    #[error("verification failed in {environment}: {message}")]
    VerificationFailure {
        environment: String,
        message: String,
    },

    /// Promotion eligibility unmet; the run halts at that boundary
    #[error("promotion {from_env} -> {to_env} blocked: {reason}")]
    PromotionBlocked {
        from_env: String,
        to_env: String,
        reason: BlockReason,
    },

    /// Rollback itself failed; requires human escalation
    #[error("rollback failed in {environment}: {message}")]
    RollbackFailure {
        environment: String,
        message: String,
    },

    /// Persistence layer failure surfaced through a store seam
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Stable taxonomy code, used as the non-zero CLI exit status
    pub fn taxonomy_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 10,
            Self::PolicyViolation { .. } => 11,
            Self::Authentication(_) => 12,
            Self::ImmutabilityViolation { .. } => 13,
            Self::TransientInfrastructure(_) => 14,
            Self::TerminalInfrastructure(_) => 15,
            Self::VerificationFailure { .. } => 16,
            Self::PromotionBlocked { .. } => 17,
            Self::RollbackFailure { .. } => 18,
            Self::Store(_) => 19,
        }
    }

    /// True for errors eligible for bounded automatic retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientInfrastructure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes_are_distinct() {
        let errors = [
            EngineError::Validation("x".into()),
            EngineError::PolicyViolation {
                rule: "r".into(),
                message: "m".into(),
            },
            EngineError::Authentication("x".into()),
            EngineError::ImmutabilityViolation {
                tag: "t".into(),
                existing: "a".into(),
                attempted: "b".into(),
            },
            EngineError::TransientInfrastructure("x".into()),
            EngineError::TerminalInfrastructure("x".into()),
            EngineError::VerificationFailure {
                environment: "dev".into(),
                message: "m".into(),
            },
            EngineError::PromotionBlocked {
                from_env: "staging".into(),
                to_env: "production".into(),
                reason: BlockReason::SoakTimeNotElapsed,
            },
            EngineError::RollbackFailure {
                environment: "staging".into(),
                message: "m".into(),
            },
            EngineError::Store("x".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.taxonomy_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(EngineError::TransientInfrastructure("rate limit".into()).is_transient());
        assert!(!EngineError::TerminalInfrastructure("quota".into()).is_transient());
        assert!(!EngineError::Validation("bad".into()).is_transient());
    }
}
