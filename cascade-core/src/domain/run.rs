//! Pipeline run domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pipeline execution triggered by a commit or dispatch event
///
/// Structure shared between orchestrator (persists) and engine (drives).
/// A run is owned exclusively by the coordinator and is terminal once its
/// status leaves `Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub repository: String,
    pub branch: String,
    pub commit_sha: String,
    pub trigger: TriggerKind,
    /// Target environments in promotion order, as resolved from the branch.
    pub target_environments: Vec<String>,
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PipelineRun {
    /// Creates a new run in `Pending` state for a trigger event
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        commit_sha: impl Into<String>,
        trigger: TriggerKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            repository: repository.into(),
            branch: branch.into(),
            commit_sha: commit_sha.into(),
            trigger,
            target_environments: Vec::new(),
            status: RunStatus::Pending,
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }
}

/// What caused a pipeline run to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Push,
    PullRequest,
    Manual,
    Schedule,
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Returns true once the run can no longer change status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_starts_pending() {
        let run = PipelineRun::new("org/app", "main", "a".repeat(40), TriggerKind::Push);
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.finished_at.is_none());
        assert!(run.target_environments.is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }
}
