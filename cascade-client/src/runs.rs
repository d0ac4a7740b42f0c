//! Run-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use cascade_core::dto::promotion::PromoteRequest;
use cascade_core::dto::run::{RunDetail, RunSummary, SubmitScanReport, TriggerRun};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Trigger a new pipeline run
    ///
    /// The orchestrator accepts the run and drives it in the background;
    /// the returned summary carries the run id to poll with.
    pub async fn trigger_run(&self, req: TriggerRun) -> Result<RunSummary> {
        let url = format!("{}/api/run/trigger", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a run with its stage records and failure report
    pub async fn get_run(&self, run_id: Uuid) -> Result<RunDetail> {
        let url = format!("{}/api/run/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List recent runs, most recent first
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let url = format!("{}/api/run/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Manually promote a run's artifact into a target environment
    ///
    /// Synchronous: the response reflects where the promotion ended up.
    /// Blocked promotions come back as an API error carrying the
    /// taxonomy code.
    pub async fn promote_run(&self, run_id: Uuid, req: PromoteRequest) -> Result<RunSummary> {
        let url = format!("{}/api/run/{}/promote", self.base_url, run_id);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Submit a scan report for an artifact
    ///
    /// Called by external scanners once their analysis finishes; the
    /// promotion gate reads the latest report per artifact.
    pub async fn submit_scan_report(&self, req: SubmitScanReport) -> Result<()> {
        let url = format!("{}/api/scan/report", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_empty_response(response).await
    }
}
