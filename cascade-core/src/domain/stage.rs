//! Stage domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed stage vocabulary of the pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Validate,
    Build,
    Test,
    Scan,
    Deploy,
    Verify,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Build => write!(f, "build"),
            Self::Test => write!(f, "test"),
            Self::Scan => write!(f, "scan"),
            Self::Deploy => write!(f, "deploy"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// Stage execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    TimedOut,
    Skipped,
    RolledBack,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// How a stage failure was classified by the retry controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Temporary condition, eligible for bounded automatic retry
    Transient,
    /// No retry or rollback can succeed without intervention
    Terminal,
    /// The stage exceeded its configured timeout
    Timeout,
    /// A verify stage failed; triggers rollback, not retry
    Verification,
    /// A deny-severity policy rule matched at validate time
    PolicyDenied,
}

/// One node execution within a run
///
/// Created when the coordinator schedules it; immutable once terminal.
/// Retries append attempt records under the same stage, they never create
/// a new stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub run_id: Uuid,
    pub kind: StageKind,
    /// Target environment; only set for deploy/verify stages.
    pub environment: Option<String>,
    pub status: StageStatus,
    pub attempts: Vec<StageAttempt>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub classification: Option<FailureClass>,
}

impl Stage {
    pub fn new(run_id: Uuid, kind: StageKind, environment: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            kind,
            environment,
            status: StageStatus::Pending,
            attempts: Vec::new(),
            started_at: None,
            ended_at: None,
            classification: None,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// One attempt at executing a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageAttempt {
    pub number: u32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub outcome: StageStatus,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_terminal() {
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
        assert!(StageStatus::Success.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::TimedOut.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(StageStatus::RolledBack.is_terminal());
    }

    #[test]
    fn test_new_stage_has_no_attempts() {
        let stage = Stage::new(Uuid::new_v4(), StageKind::Deploy, Some("dev".into()));
        assert_eq!(stage.status, StageStatus::Pending);
        assert_eq!(stage.attempt_count(), 0);
        assert!(stage.classification.is_none());
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Validate.to_string(), "validate");
        assert_eq!(StageKind::Verify.to_string(), "verify");
    }
}
