//! Promotion and approval domain types
//!
//! Promotion records are audit entries; a record opened while a promotion
//! waits on approval is settled in place once the decision lands, and is
//! never touched again after that. Approval requests are the engine's
//! single long-lived suspension point and only change state through an
//! external decision signal or expiry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source pseudo-environment for the initial build → first-env promotion
pub const BUILD_SOURCE: &str = "build";

/// One decision for moving an artifact between environments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub id: Uuid,
    pub run_id: Uuid,
    pub artifact_tag: String,
    pub artifact_digest: String,
    pub from_env: String,
    pub to_env: String,
    pub decision: PromotionDecision,
    pub block_reason: Option<BlockReason>,
    pub approver: Option<String>,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub decided_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of a promotion eligibility check or approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionDecision {
    Allowed,
    Blocked,
    Rejected,
}

/// Why a promotion was blocked or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    NotPublished,
    MutableTag,
    IncompleteMetadata,
    SourceNotVerified,
    SoakTimeNotElapsed,
    CriticalVulnerability,
    ScanMissing,
    OutsideDeploymentWindow,
    ApprovalRejected,
    ApprovalExpired,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotPublished => "not_published",
            Self::MutableTag => "mutable_tag",
            Self::IncompleteMetadata => "incomplete_metadata",
            Self::SourceNotVerified => "source_not_verified",
            Self::SoakTimeNotElapsed => "soak_time_not_elapsed",
            Self::CriticalVulnerability => "critical_vulnerability",
            Self::ScanMissing => "scan_missing",
            Self::OutsideDeploymentWindow => "outside_deployment_window",
            Self::ApprovalRejected => "approval_rejected",
            Self::ApprovalExpired => "approval_expired",
        };
        write!(f, "{s}")
    }
}

/// A suspended human gate for a protected promotion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub promotion_id: Uuid,
    pub run_id: Uuid,
    pub state: ApprovalState,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub decided_at: Option<chrono::DateTime<chrono::Utc>>,
    pub approver: Option<String>,
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.state == ApprovalState::Requested
    }

    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.is_pending() && now >= self.expires_at
    }
}

/// Approval lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Requested,
    Approved,
    Rejected,
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(state: ApprovalState) -> ApprovalRequest {
        let now = chrono::Utc::now();
        ApprovalRequest {
            id: Uuid::new_v4(),
            promotion_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            state,
            requested_at: now,
            expires_at: now + Duration::hours(24),
            decided_at: None,
            approver: None,
        }
    }

    #[test]
    fn test_pending_request_expires() {
        let req = request(ApprovalState::Requested);
        assert!(req.is_pending());
        assert!(!req.is_expired_at(chrono::Utc::now()));
        assert!(req.is_expired_at(chrono::Utc::now() + Duration::hours(25)));
    }

    #[test]
    fn test_decided_request_never_expires() {
        let req = request(ApprovalState::Approved);
        assert!(!req.is_expired_at(chrono::Utc::now() + Duration::hours(48)));
    }

    #[test]
    fn test_block_reason_display() {
        assert_eq!(
            BlockReason::CriticalVulnerability.to_string(),
            "critical_vulnerability"
        );
        assert_eq!(BlockReason::ApprovalExpired.to_string(), "approval_expired");
    }
}
