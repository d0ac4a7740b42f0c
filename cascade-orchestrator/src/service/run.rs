//! Run Service
//!
//! Business logic for triggering and inspecting pipeline runs.

use uuid::Uuid;

use cascade_core::domain::scan::ScanReport;
use cascade_core::domain::stage::StageStatus;
use cascade_core::dto::promotion::PromoteRequest;
use cascade_core::dto::run::{FailureReport, RunDetail, RunSummary, SubmitScanReport, TriggerRun};
use cascade_core::error::EngineError;
use cascade_engine::coordinator::RunProgress;

use crate::state::AppState;

/// Service error type
#[derive(Debug)]
pub enum RunError {
    NotFound(Uuid),
    Engine(EngineError),
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        RunError::Engine(err)
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Trigger a new pipeline run
///
/// The run is planned and persisted synchronously so the caller gets a
/// stable run id, then driven to completion (or suspension at the
/// approval gate) in the background.
pub async fn trigger_run(state: &AppState, req: TriggerRun) -> Result<RunSummary> {
    let run = state.coordinator.plan(&req)?;
    state.runs.insert_run(&run).await?;

    tracing::info!(
        "Run {} triggered: {}@{} ({})",
        run.id,
        run.repository,
        run.branch,
        &run.commit_sha[..12.min(run.commit_sha.len())]
    );

    let summary = RunSummary::from(&run);
    let coordinator = state.coordinator.clone();
    tokio::spawn(async move {
        let id = run.id;
        match coordinator.drive(run, req).await {
            Ok(RunProgress::Completed(run)) => {
                tracing::info!("Run {} finished: {:?}", run.id, run.status);
            }
            Ok(RunProgress::Suspended { run, approval }) => {
                tracing::info!(
                    "Run {} suspended awaiting approval {}",
                    run.id,
                    approval.id
                );
            }
            Err(err) => {
                tracing::warn!("Run {} ended in error: {}", id, err);
            }
        }
    });

    Ok(summary)
}

/// Get a run with its stages and a failure report if it failed
pub async fn get_run(state: &AppState, id: Uuid) -> Result<RunDetail> {
    let run = state
        .runs
        .fetch_run(id)
        .await?
        .ok_or(RunError::NotFound(id))?;
    let stages = state.runs.fetch_stages(id).await?;
    let artifact = state.runs.fetch_artifact(id).await?;

    let failure = stages
        .iter()
        .rev()
        .find(|s| {
            matches!(
                s.status,
                StageStatus::Failed | StageStatus::TimedOut | StageStatus::RolledBack
            )
        })
        .map(|stage| FailureReport {
            stage: stage.kind,
            environment: stage.environment.clone(),
            classification: stage.classification,
            commit_sha: run.commit_sha.clone(),
            artifact_tag: artifact.as_ref().map(|a| a.tag.clone()),
            detail: stage
                .attempts
                .last()
                .and_then(|a| a.error.clone())
                .unwrap_or_else(|| format!("{} stage did not complete", stage.kind)),
        });

    Ok(RunDetail {
        run,
        stages,
        failure,
    })
}

/// Manually promote a run's artifact into one of its target
/// environments
///
/// Unlike trigger, this is synchronous: the caller learns whether the
/// promotion deployed, suspended for approval, or was blocked.
pub async fn promote_run(state: &AppState, id: Uuid, req: PromoteRequest) -> Result<RunSummary> {
    if state.runs.fetch_run(id).await?.is_none() {
        return Err(RunError::NotFound(id));
    }

    let progress = state.coordinator.promote(id, &req.to_env).await?;
    Ok(RunSummary::from(progress.run()))
}

/// List recent runs
pub async fn list_runs(state: &AppState) -> Result<Vec<RunSummary>> {
    let runs = state.runs.list_runs(50).await?;
    Ok(runs.iter().map(RunSummary::from).collect())
}

/// Record a scan report posted by an external scanner
pub async fn submit_scan_report(state: &AppState, req: SubmitScanReport) -> Result<()> {
    let report = ScanReport {
        artifact_tag: req.artifact_tag,
        critical_findings: req.critical_findings,
        total_findings: req.total_findings,
        completed_at: chrono::Utc::now(),
    };

    tracing::info!(
        "Scan recorded for tag {}: {} critical / {} total",
        report.artifact_tag,
        report.critical_findings,
        report.total_findings
    );

    state.runs.record_scan(&report).await?;
    Ok(())
}
