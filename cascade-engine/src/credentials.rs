//! Short-lived credential exchange
//!
//! Every deploy/verify against a cloud resource first requests a
//! short-lived credential scoped to the stage's declared permission.
//! Long-lived credentials are never accepted or stored; the exchange
//! mechanism itself (OIDC with a cloud provider) is an external
//! collaborator behind this trait.

use async_trait::async_trait;

use cascade_core::error::EngineError;

/// A short-lived, scope-bound credential
#[derive(Debug, Clone)]
pub struct ScopedToken {
    pub token: String,
    pub scope: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl ScopedToken {
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Exchanges workload identity for a deployment-scoped token
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(
        &self,
        repository: &str,
        environment: &str,
    ) -> Result<ScopedToken, EngineError>;
}

/// Fixed-token exchange for tests and local development
pub struct StaticTokenExchange {
    lifetime: std::time::Duration,
}

impl StaticTokenExchange {
    pub fn new(lifetime: std::time::Duration) -> Self {
        Self { lifetime }
    }
}

impl Default for StaticTokenExchange {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(900))
    }
}

#[async_trait]
impl TokenExchange for StaticTokenExchange {
    async fn exchange(
        &self,
        repository: &str,
        environment: &str,
    ) -> Result<ScopedToken, EngineError> {
        let lifetime = chrono::Duration::from_std(self.lifetime)
            .map_err(|e| EngineError::Authentication(e.to_string()))?;
        Ok(ScopedToken {
            token: uuid::Uuid::new_v4().to_string(),
            scope: format!("deploy:{repository}:{environment}"),
            expires_at: chrono::Utc::now() + lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_exchange_scopes_token() {
        let exchange = StaticTokenExchange::default();
        let token = exchange.exchange("org/app", "staging").await.unwrap();
        assert_eq!(token.scope, "deploy:org/app:staging");
        assert!(!token.is_expired_at(chrono::Utc::now()));
        assert!(token.is_expired_at(chrono::Utc::now() + chrono::Duration::hours(1)));
    }
}
