//! Promotion and approval DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::promotion::{ApprovalState, PromotionRecord};

/// Request to promote a suspended run into its next environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub to_env: String,
}

/// Human decision on a pending approval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approve: bool,
    pub approver: String,
}

/// Approval status exposed through the query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub request_id: Uuid,
    pub run_id: Uuid,
    pub state: ApprovalState,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub promotion: Option<PromotionRecord>,
}

/// Request to roll an environment back to its previous artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub environment: String,
}
