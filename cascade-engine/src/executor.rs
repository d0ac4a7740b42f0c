//! Stage executor
//!
//! Runs one stage to completion: invokes the opaque external stage body,
//! measures elapsed time, and truncates at the configured timeout. The
//! executor surfaces the error signal without interpreting it; failure
//! classification belongs to the retry controller. Its only retained
//! side effect is one structured record per invocation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use cascade_core::domain::stage::{StageKind, StageStatus};

/// What the executor needs to invoke one stage
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub run_id: Uuid,
    pub kind: StageKind,
    /// Target environment; only set for deploy/verify stages.
    pub environment: Option<String>,
    pub repository: String,
    pub commit_sha: String,
    pub artifact_tag: Option<String>,
}

/// Error signal surfaced by a stage body
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StageBodyError {
    pub message: String,
    /// Machine-readable signal from the external tool (exit code, error
    /// class); consumed by the caller-supplied transient predicate.
    pub signal: Option<String>,
}

impl StageBodyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            signal: None,
        }
    }

    pub fn with_signal(message: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            signal: Some(signal.into()),
        }
    }
}

/// Output reported by a successful stage body
#[derive(Debug, Clone, Default)]
pub struct StageBodyOutput {
    /// Content digest produced by a build stage body.
    pub digest: Option<String>,
    /// Reference to detailed output (log location, report URL).
    pub detail: Option<String>,
}

/// The opaque external call per stage kind
///
/// Build tools, test runners, scanners, deployment drivers, and
/// verification probes all sit behind this trait; the engine does not
/// define what happens inside.
#[async_trait]
pub trait StageBody: Send + Sync {
    async fn invoke(&self, spec: &StageSpec) -> Result<StageBodyOutput, StageBodyError>;
}

/// Terminal outcome of one stage attempt
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Success {
        duration: Duration,
        output: StageBodyOutput,
    },
    Failed {
        duration: Duration,
        error: StageBodyError,
    },
    TimedOut {
        limit: Duration,
    },
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status(&self) -> StageStatus {
        match self {
            Self::Success { .. } => StageStatus::Success,
            Self::Failed { .. } => StageStatus::Failed,
            Self::TimedOut { .. } => StageStatus::TimedOut,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error, .. } => Some(error.message.clone()),
            Self::TimedOut { limit } => Some(format!("timed out after {limit:?}")),
        }
    }
}

/// Timeout-bounded driver for stage bodies
///
/// Stateless with respect to the pipeline as a whole.
pub struct StageExecutor {
    body: Arc<dyn StageBody>,
}

impl StageExecutor {
    pub fn new(body: Arc<dyn StageBody>) -> Self {
        Self { body }
    }

    /// Runs one stage attempt, truncating at `timeout`
    pub async fn run(&self, spec: &StageSpec, timeout: Duration) -> StageOutcome {
        let started = tokio::time::Instant::now();

        let outcome = match tokio::time::timeout(timeout, self.body.invoke(spec)).await {
            Ok(Ok(output)) => StageOutcome::Success {
                duration: started.elapsed(),
                output,
            },
            Ok(Err(error)) => StageOutcome::Failed {
                duration: started.elapsed(),
                error,
            },
            Err(_) => StageOutcome::TimedOut { limit: timeout },
        };

        // The sole record the executor retains after returning
        tracing::info!(
            run_id = %spec.run_id,
            stage = %spec.kind,
            environment = spec.environment.as_deref().unwrap_or("-"),
            duration_ms = started.elapsed().as_millis() as u64,
            outcome = %outcome.status_label(),
            "stage attempt finished"
        );

        outcome
    }
}

impl StageOutcome {
    fn status_label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}
