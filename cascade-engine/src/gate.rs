//! Promotion gate
//!
//! Validates promotion eligibility and, for approval-protected
//! environments, opens the human approval request the coordinator
//! suspends on. Eligibility checks run in a fixed order and the first
//! failure decides the block reason.

use std::time::Duration;

use uuid::Uuid;

use cascade_core::domain::artifact::{Artifact, ArtifactState, REQUIRED_METADATA_KEYS};
use cascade_core::domain::environment::Environment;
use cascade_core::domain::promotion::{
    ApprovalRequest, ApprovalState, BlockReason, PromotionDecision, PromotionRecord,
};
use cascade_core::domain::scan::ScanReport;

/// Gate tuning
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum verified time in the source environment before production
    /// promotion.
    pub soak_time: Duration,
    /// How long an approval request stays open.
    pub approval_ttl: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            soak_time: Duration::from_secs(3600),
            approval_ttl: Duration::from_secs(86400),
        }
    }
}

/// Everything an eligibility decision reads; passed explicitly so the
/// checks stay pure
pub struct EligibilityInput<'a> {
    pub run_id: Uuid,
    pub artifact: &'a Artifact,
    /// Source environment; None for the initial build -> first-env step.
    pub from_env: Option<&'a Environment>,
    pub to_env: &'a Environment,
    /// Latest scan result for this artifact, if any.
    pub scan: Option<&'a ScanReport>,
    pub now: chrono::DateTime<chrono::Utc>,
}

/// Eligibility and approval logic for environment promotion
pub struct PromotionGate {
    config: GateConfig,
}

impl PromotionGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Checks eligibility in order and returns the audit record
    ///
    /// Order: artifact published and immutable; metadata complete and
    /// traceable; source environment verified this exact artifact; for
    /// production, soak elapsed and scan clean; deployment window open
    /// when one is configured.
    pub fn check_eligibility(&self, input: &EligibilityInput<'_>) -> PromotionRecord {
        let reason = self.first_block_reason(input);
        let decision = if reason.is_some() {
            PromotionDecision::Blocked
        } else {
            PromotionDecision::Allowed
        };

        if let Some(reason) = reason {
            tracing::warn!(
                artifact = %input.artifact.tag,
                to_env = %input.to_env.name,
                %reason,
                "promotion blocked"
            );
        }

        PromotionRecord {
            id: Uuid::new_v4(),
            run_id: input.run_id,
            artifact_tag: input.artifact.tag.clone(),
            artifact_digest: input.artifact.digest.clone(),
            from_env: input
                .from_env
                .map(|e| e.name.clone())
                .unwrap_or_else(|| cascade_core::domain::promotion::BUILD_SOURCE.to_string()),
            to_env: input.to_env.name.clone(),
            decision,
            block_reason: reason,
            approver: None,
            requested_at: input.now,
            decided_at: Some(input.now),
        }
    }

    fn first_block_reason(&self, input: &EligibilityInput<'_>) -> Option<BlockReason> {
        let artifact = input.artifact;

        if artifact.state != ArtifactState::Published && artifact.state != ArtifactState::Deployed {
            return Some(BlockReason::NotPublished);
        }
        if !cascade_core::domain::artifact::is_immutable_tag(&artifact.tag) {
            return Some(BlockReason::MutableTag);
        }

        let complete = REQUIRED_METADATA_KEYS
            .iter()
            .all(|key| artifact.metadata.get(*key).is_some_and(|v| !v.is_empty()));
        if !complete {
            return Some(BlockReason::IncompleteMetadata);
        }

        // Source verification: no artifact substitution allowed
        if let Some(from_env) = input.from_env {
            let verified = from_env
                .deployed
                .as_ref()
                .is_some_and(|d| d.verified && d.digest == artifact.digest);
            if !verified {
                return Some(BlockReason::SourceNotVerified);
            }
        }

        if input.to_env.name == "production" {
            // Production is never reached directly from build
            let Some(from_env) = input.from_env else {
                return Some(BlockReason::SourceNotVerified);
            };
            let deployed_at = from_env
                .deployed
                .as_ref()
                .map(|d| d.deployed_at)
                .unwrap_or(input.now);
            let soak = chrono::Duration::from_std(self.config.soak_time)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
            if input.now < deployed_at + soak {
                return Some(BlockReason::SoakTimeNotElapsed);
            }

            match input.scan {
                None => return Some(BlockReason::ScanMissing),
                Some(report) if !report.is_clean() => {
                    return Some(BlockReason::CriticalVulnerability);
                }
                Some(_) => {}
            }
        }

        if let Some(window) = input.to_env.policy.deployment_window
            && !window.contains(input.now)
        {
            return Some(BlockReason::OutsideDeploymentWindow);
        }

        None
    }

    /// Opens the approval request for a protected promotion
    pub fn open_approval(
        &self,
        promotion: &PromotionRecord,
        now: chrono::DateTime<chrono::Utc>,
    ) -> ApprovalRequest {
        let ttl = chrono::Duration::from_std(self.config.approval_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        ApprovalRequest {
            id: Uuid::new_v4(),
            promotion_id: promotion.id,
            run_id: promotion.run_id,
            state: ApprovalState::Requested,
            requested_at: now,
            expires_at: now + ttl,
            decided_at: None,
            approver: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::domain::environment::{
        DeployedArtifact, DeploymentWindow, ProtectionPolicy,
    };
    use std::collections::HashMap;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn artifact() -> Artifact {
        Artifact {
            name: "app".into(),
            tag: SHA.into(),
            digest: "sha256:aaa".into(),
            metadata: Artifact::build_metadata(SHA, "https://example.com/org/app", Uuid::new_v4()),
            registry_location: "registry.local/app".into(),
            state: ArtifactState::Published,
            deployed_to: vec![],
        }
    }

    fn env_with_deployment(name: &str, digest: &str, verified: bool, age: Duration) -> Environment {
        let mut env = Environment::new(name, vec![], ProtectionPolicy::auto());
        env.deployed = Some(DeployedArtifact {
            tag: SHA.into(),
            digest: digest.into(),
            deployed_at: chrono::Utc::now() - chrono::Duration::from_std(age).unwrap(),
            verified,
        });
        env
    }

    fn clean_scan() -> ScanReport {
        ScanReport {
            artifact_tag: SHA.into(),
            critical_findings: 0,
            total_findings: 3,
            completed_at: chrono::Utc::now(),
        }
    }

    fn gate() -> PromotionGate {
        PromotionGate::new(GateConfig::default())
    }

    fn production() -> Environment {
        Environment::new(
            "production",
            vec!["staging".into()],
            ProtectionPolicy::manual(1),
        )
    }

    #[test]
    fn test_build_to_dev_is_trivially_eligible() {
        let artifact = artifact();
        let dev = Environment::new("dev", vec![], ProtectionPolicy::auto());
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: None,
            to_env: &dev,
            scan: None,
            now: chrono::Utc::now(),
        });
        assert_eq!(record.decision, PromotionDecision::Allowed);
        assert_eq!(record.from_env, "build");
    }

    #[test]
    fn test_unpublished_artifact_blocked() {
        let mut artifact = artifact();
        artifact.state = ArtifactState::Created;
        let dev = Environment::new("dev", vec![], ProtectionPolicy::auto());
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: None,
            to_env: &dev,
            scan: None,
            now: chrono::Utc::now(),
        });
        assert_eq!(record.block_reason, Some(BlockReason::NotPublished));
    }

    #[test]
    fn test_incomplete_metadata_blocked() {
        let mut artifact = artifact();
        artifact.metadata.remove("run_id");
        let dev = Environment::new("dev", vec![], ProtectionPolicy::auto());
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: None,
            to_env: &dev,
            scan: None,
            now: chrono::Utc::now(),
        });
        assert_eq!(record.block_reason, Some(BlockReason::IncompleteMetadata));
    }

    #[test]
    fn test_substituted_artifact_blocked() {
        let artifact = artifact();
        let staging = env_with_deployment("staging", "sha256:other", true, Duration::from_secs(7200));
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: Some(&staging),
            to_env: &production(),
            scan: Some(&clean_scan()),
            now: chrono::Utc::now(),
        });
        assert_eq!(record.block_reason, Some(BlockReason::SourceNotVerified));
    }

    #[test]
    fn test_soak_time_enforced_for_production() {
        let artifact = artifact();
        let staging = env_with_deployment("staging", "sha256:aaa", true, Duration::from_secs(60));
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: Some(&staging),
            to_env: &production(),
            scan: Some(&clean_scan()),
            now: chrono::Utc::now(),
        });
        assert_eq!(record.block_reason, Some(BlockReason::SoakTimeNotElapsed));
    }

    #[test]
    fn test_critical_findings_block_production() {
        let artifact = artifact();
        let staging = env_with_deployment("staging", "sha256:aaa", true, Duration::from_secs(7200));
        let dirty = ScanReport {
            critical_findings: 1,
            ..clean_scan()
        };
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: Some(&staging),
            to_env: &production(),
            scan: Some(&dirty),
            now: chrono::Utc::now(),
        });
        assert_eq!(
            record.block_reason,
            Some(BlockReason::CriticalVulnerability)
        );
    }

    #[test]
    fn test_missing_scan_blocks_production() {
        let artifact = artifact();
        let staging = env_with_deployment("staging", "sha256:aaa", true, Duration::from_secs(7200));
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: Some(&staging),
            to_env: &production(),
            scan: None,
            now: chrono::Utc::now(),
        });
        assert_eq!(record.block_reason, Some(BlockReason::ScanMissing));
    }

    #[test]
    fn test_eligible_production_promotion() {
        let artifact = artifact();
        let staging = env_with_deployment("staging", "sha256:aaa", true, Duration::from_secs(7200));
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: Some(&staging),
            to_env: &production(),
            scan: Some(&clean_scan()),
            now: chrono::Utc::now(),
        });
        assert_eq!(record.decision, PromotionDecision::Allowed);
        assert!(record.block_reason.is_none());
    }

    #[test]
    fn test_closed_deployment_window_blocks() {
        use chrono::TimeZone;
        let artifact = artifact();
        let mut staging = env_with_deployment("staging", "sha256:aaa", true, Duration::from_secs(7200));
        staging.policy.deployment_window = Some(DeploymentWindow {
            start_hour: 9,
            end_hour: 17,
        });
        let midnight = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 30, 0).unwrap();
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: None,
            to_env: &staging,
            scan: None,
            now: midnight,
        });
        assert_eq!(
            record.block_reason,
            Some(BlockReason::OutsideDeploymentWindow)
        );
    }

    #[test]
    fn test_open_approval_has_ttl() {
        let artifact = artifact();
        let dev = Environment::new("dev", vec![], ProtectionPolicy::auto());
        let now = chrono::Utc::now();
        let record = gate().check_eligibility(&EligibilityInput {
            run_id: Uuid::new_v4(),
            artifact: &artifact,
            from_env: None,
            to_env: &dev,
            scan: None,
            now,
        });
        let approval = gate().open_approval(&record, now);
        assert_eq!(approval.state, ApprovalState::Requested);
        assert_eq!(approval.expires_at, now + chrono::Duration::hours(24));
        assert_eq!(approval.promotion_id, record.id);
    }
}
