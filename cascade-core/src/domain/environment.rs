//! Environment domain types
//!
//! An environment's currently-deployed pointer and its deployment history
//! are the only mutable shared state in the system. Both are updated only
//! after a verify stage reaches a terminal outcome, guarded by the
//! per-environment lock and a compare-and-swap version counter.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default cap on retained deployment history records per environment
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// A deployment target (dev, staging, production, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Environments that must be verified before promotion into this one,
    /// in order (production's predecessor is staging).
    pub predecessors: Vec<String>,
    pub policy: ProtectionPolicy,
    /// Currently-deployed artifact; never partially updated.
    pub deployed: Option<DeployedArtifact>,
    /// Optimistic-concurrency counter; bumped on every pointer write.
    pub version: u64,
    /// Most-recent-first deployment records, bounded.
    pub history: Vec<DeploymentRecord>,
}

impl Environment {
    pub fn new(name: impl Into<String>, predecessors: Vec<String>, policy: ProtectionPolicy) -> Self {
        Self {
            name: name.into(),
            predecessors,
            policy,
            deployed: None,
            version: 0,
            history: Vec::new(),
        }
    }

    /// The standard three-environment promotion chain
    pub fn default_chain() -> Vec<Environment> {
        vec![
            Environment::new("dev", vec![], ProtectionPolicy::auto()),
            Environment::new("staging", vec!["dev".to_string()], ProtectionPolicy::auto()),
            Environment::new(
                "production",
                vec!["staging".to_string()],
                ProtectionPolicy::manual(1),
            ),
        ]
    }

    /// Records a verified deployment: moves the pointer, bumps the version,
    /// and prepends a history record, trimming to `limit`.
    pub fn record_deployment(&mut self, record: DeploymentRecord, limit: usize) {
        self.deployed = Some(DeployedArtifact {
            tag: record.artifact_tag.clone(),
            digest: record.digest.clone(),
            deployed_at: record.deployed_at,
            verified: record.verified,
        });
        self.version += 1;
        self.history.insert(0, record);
        self.history.truncate(limit);
    }

    /// The most recent verified deployment older than the current pointer,
    /// i.e. the rollback target. None when nothing was deployed before.
    pub fn previous_deployment(&self) -> Option<&DeploymentRecord> {
        let current = self.deployed.as_ref()?;
        self.history
            .iter()
            .find(|r| r.verified && r.digest != current.digest)
    }
}

/// Protection rules applied when promoting into an environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionPolicy {
    pub auto_deploy: bool,
    pub required_approvals: u32,
    /// UTC hour range during which deployments are admitted; None = always open.
    pub deployment_window: Option<DeploymentWindow>,
}

impl ProtectionPolicy {
    pub fn auto() -> Self {
        Self {
            auto_deploy: true,
            required_approvals: 0,
            deployment_window: None,
        }
    }

    pub fn manual(required_approvals: u32) -> Self {
        Self {
            auto_deploy: false,
            required_approvals,
            deployment_window: None,
        }
    }

    pub fn requires_approval(&self) -> bool {
        self.required_approvals > 0
    }
}

/// Inclusive-start, exclusive-end UTC hour window
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeploymentWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl DeploymentWindow {
    pub fn contains(&self, at: chrono::DateTime<chrono::Utc>) -> bool {
        use chrono::Timelike;
        let hour = at.hour() as u8;
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Window wraps midnight
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// The currently-deployed artifact reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedArtifact {
    pub tag: String,
    pub digest: String,
    pub deployed_at: chrono::DateTime<chrono::Utc>,
    pub verified: bool,
}

/// One entry in an environment's deployment history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub artifact_tag: String,
    pub digest: String,
    pub run_id: Uuid,
    pub deployed_at: chrono::DateTime<chrono::Utc>,
    pub verified: bool,
}
