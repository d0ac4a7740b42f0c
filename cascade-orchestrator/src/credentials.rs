//! OIDC token exchange
//!
//! Trades the orchestrator's workload identity for a short-lived
//! deployment credential scoped to one repository and environment. The
//! exchange endpoint is a cloud provider STS-style service; no
//! long-lived credential is ever read from configuration.

use async_trait::async_trait;
use serde::Deserialize;

use cascade_core::error::EngineError;
use cascade_engine::credentials::{ScopedToken, TokenExchange};

/// Token exchange against an HTTP STS endpoint
pub struct OidcTokenExchange {
    client: reqwest::Client,
    token_url: String,
}

impl OidcTokenExchange {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: token_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    /// Lifetime in seconds.
    expires_in: i64,
}

#[async_trait]
impl TokenExchange for OidcTokenExchange {
    async fn exchange(
        &self,
        repository: &str,
        environment: &str,
    ) -> Result<ScopedToken, EngineError> {
        let scope = format!("deploy:{repository}:{environment}");

        let response = self
            .client
            .post(&self.token_url)
            .json(&serde_json::json!({
                "repository": repository,
                "environment": environment,
                "scope": scope,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Authentication(format!("token exchange failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Authentication(format!(
                "token exchange rejected with status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Authentication(format!("malformed token response: {e}")))?;

        Ok(ScopedToken {
            token: body.token,
            scope,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }
}
