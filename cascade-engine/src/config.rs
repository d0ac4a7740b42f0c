//! Engine configuration
//!
//! Defines all tunable parameters for the engine: stage timeouts, retry
//! backoff, soak window, approval expiry, and queue expiry. Everything
//! here is a configuration value so environments can be tuned without
//! code changes.

use std::time::Duration;

use cascade_core::domain::stage::StageKind;

/// Engine configuration
///
/// All timeouts and windows are configurable to allow tuning for
/// different deployment scenarios (dev vs prod, fast vs slow targets).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-stage-kind execution timeouts
    pub timeouts: StageTimeouts,

    /// Maximum deploy attempts for transient failures (first try included)
    pub deploy_max_attempts: u32,

    /// Backoff delays between deploy retries, in order
    pub deploy_backoff: Vec<Duration>,

    /// Minimum verified time in the source environment before an artifact
    /// is eligible for promotion to production
    pub soak_time: Duration,

    /// How long an approval request stays open before expiring
    pub approval_ttl: Duration,

    /// How long a queued deployment request stays valid
    pub queue_expiry: Duration,

    /// Deployment history records retained per environment
    pub history_limit: usize,
}

/// Execution timeout per stage kind
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub validate: Duration,
    pub build: Duration,
    pub test: Duration,
    pub scan: Duration,
    pub deploy: Duration,
    pub verify: Duration,
}

impl StageTimeouts {
    pub fn for_kind(&self, kind: StageKind) -> Duration {
        match kind {
            StageKind::Validate => self.validate,
            StageKind::Build => self.build,
            StageKind::Test => self.test,
            StageKind::Scan => self.scan,
            StageKind::Deploy => self.deploy,
            StageKind::Verify => self.verify,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            validate: Duration::from_secs(300),
            build: Duration::from_secs(1800),
            test: Duration::from_secs(1800),
            scan: Duration::from_secs(1200),
            deploy: Duration::from_secs(900),
            verify: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional, seconds unless noted):
    /// - DEPLOY_MAX_ATTEMPTS (default: 3)
    /// - DEPLOY_BACKOFF (comma-separated seconds, default: "30,60")
    /// - SOAK_TIME (default: 3600)
    /// - APPROVAL_TTL (default: 86400)
    /// - QUEUE_EXPIRY (default: 3600)
    /// - HISTORY_LIMIT (records, default: 20)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DEPLOY_MAX_ATTEMPTS") {
            config.deploy_max_attempts = v.parse()?;
        }
        if let Ok(v) = std::env::var("DEPLOY_BACKOFF") {
            config.deploy_backoff = v
                .split(',')
                .map(|s| s.trim().parse::<u64>().map(Duration::from_secs))
                .collect::<Result<_, _>>()?;
        }
        if let Ok(v) = std::env::var("SOAK_TIME") {
            config.soak_time = Duration::from_secs(v.parse()?);
        }
        if let Ok(v) = std::env::var("APPROVAL_TTL") {
            config.approval_ttl = Duration::from_secs(v.parse()?);
        }
        if let Ok(v) = std::env::var("QUEUE_EXPIRY") {
            config.queue_expiry = Duration::from_secs(v.parse()?);
        }
        if let Ok(v) = std::env::var("HISTORY_LIMIT") {
            config.history_limit = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.deploy_max_attempts == 0 {
            anyhow::bail!("deploy_max_attempts must be greater than 0");
        }

        if self.deploy_backoff.len() + 1 < self.deploy_max_attempts as usize {
            anyhow::bail!(
                "deploy_backoff must provide a delay for each retry ({} attempts need {} delays)",
                self.deploy_max_attempts,
                self.deploy_max_attempts - 1
            );
        }

        if self.history_limit == 0 {
            anyhow::bail!("history_limit must be greater than 0");
        }

        if self.approval_ttl.as_secs() == 0 {
            anyhow::bail!("approval_ttl must be greater than 0");
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: StageTimeouts::default(),
            deploy_max_attempts: 3,
            deploy_backoff: vec![Duration::from_secs(30), Duration::from_secs(60)],
            soak_time: Duration::from_secs(3600),
            approval_ttl: Duration::from_secs(86400),
            queue_expiry: Duration::from_secs(3600),
            history_limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.deploy_max_attempts, 3);
        assert_eq!(config.deploy_backoff.len(), 2);
        assert_eq!(config.soak_time, Duration::from_secs(3600));
    }

    #[test]
    fn test_backoff_must_cover_retries() {
        let mut config = EngineConfig::default();
        config.deploy_max_attempts = 5;
        assert!(config.validate().is_err());

        config.deploy_backoff = vec![Duration::from_secs(1); 4];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = EngineConfig::default();
        config.deploy_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_lookup_per_kind() {
        let timeouts = StageTimeouts::default();
        assert_eq!(timeouts.for_kind(StageKind::Build), timeouts.build);
        assert_eq!(timeouts.for_kind(StageKind::Verify), timeouts.verify);
    }
}
