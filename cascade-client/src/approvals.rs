//! Approval-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use cascade_core::dto::promotion::{ApprovalDecision, ApprovalStatus};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Approvals
    // =============================================================================

    /// Record a decision on a pending approval request
    ///
    /// Approving resumes the suspended run; rejecting fails it. The
    /// decision is final.
    pub async fn decide_approval(
        &self,
        approval_id: Uuid,
        req: ApprovalDecision,
    ) -> Result<ApprovalStatus> {
        let url = format!("{}/api/approval/{}/decide", self.base_url, approval_id);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get the current state of an approval request
    pub async fn get_approval(&self, approval_id: Uuid) -> Result<ApprovalStatus> {
        let url = format!("{}/api/approval/{}", self.base_url, approval_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List approval requests still awaiting a decision
    pub async fn list_pending_approvals(&self) -> Result<Vec<ApprovalStatus>> {
        let url = format!("{}/api/approval/pending", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
