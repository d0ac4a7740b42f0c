//! Environment-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use cascade_core::domain::environment::Environment;
use cascade_core::dto::promotion::RollbackRequest;

impl OrchestratorClient {
    // =============================================================================
    // Environments
    // =============================================================================

    /// List environments with their deployed pointers and history
    pub async fn list_environments(&self) -> Result<Vec<Environment>> {
        let url = format!("{}/api/environment/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Roll an environment back to its previous verified artifact
    ///
    /// Blocks until the rollback deploy and verify finish.
    pub async fn rollback_environment(&self, req: RollbackRequest) -> Result<()> {
        let url = format!("{}/api/environment/rollback", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_empty_response(response).await
    }
}
