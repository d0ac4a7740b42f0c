//! Run DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::run::{PipelineRun, RunStatus, TriggerKind};
use crate::domain::stage::{FailureClass, Stage, StageKind};
use crate::domain::workflow::WorkflowDefinition;

/// Request to trigger a new pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRun {
    pub repository: String,
    pub branch: String,
    pub commit_sha: String,
    pub trigger: TriggerKind,
    /// Workflow document evaluated by the policy rules at validate time.
    pub workflow: WorkflowDefinition,
}

/// Compact run representation for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub repository: String,
    pub branch: String,
    pub commit_sha: String,
    pub status: RunStatus,
    pub target_environments: Vec<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&PipelineRun> for RunSummary {
    fn from(run: &PipelineRun) -> Self {
        Self {
            id: run.id,
            repository: run.repository.clone(),
            branch: run.branch.clone(),
            commit_sha: run.commit_sha.clone(),
            status: run.status,
            target_environments: run.target_environments.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

/// Full run detail with its stage records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetail {
    pub run: PipelineRun,
    pub stages: Vec<Stage>,
    pub failure: Option<FailureReport>,
}

/// User-visible failure description
///
/// Always carries the failing stage, its classification, the commit or
/// artifact identity, and a reference to detailed output; never a bare
/// exit code alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub stage: StageKind,
    pub environment: Option<String>,
    pub classification: Option<FailureClass>,
    pub commit_sha: String,
    pub artifact_tag: Option<String>,
    pub detail: String,
}

/// Report posted by an external scanner for a run's artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitScanReport {
    pub artifact_tag: String,
    pub critical_findings: u32,
    pub total_findings: u32,
}
