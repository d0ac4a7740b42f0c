//! Failure and retry controller
//!
//! Wraps stage executor outcomes and decides retry, hard-fail, or
//! rollback per stage-type policy:
//!
//! - validate/build/test/scan: hard fail, no retry
//! - deploy: transient failures retried with configured backoff;
//!   terminal failures hard fail
//! - verify: no retry; failure or timeout triggers rollback
//!
//! Transient-vs-terminal classification is a caller-supplied predicate
//! over the stage body's error signal, not inferred here.

use std::sync::Arc;
use std::time::Duration;

use cascade_core::domain::stage::{FailureClass, StageAttempt, StageKind, StageStatus};

use crate::executor::{StageBodyError, StageBodyOutput, StageExecutor, StageOutcome, StageSpec};

/// Caller-supplied classification of stage body errors
pub type TransientPredicate = Arc<dyn Fn(&StageBodyError) -> bool + Send + Sync>;

/// A reasonable default: classifies by the error signal the external
/// tool attached. Callers deploying against other infrastructures are
/// expected to supply their own predicate.
pub fn signal_based_predicate() -> TransientPredicate {
    Arc::new(|error: &StageBodyError| {
        matches!(
            error.signal.as_deref(),
            Some("network" | "timeout" | "rate_limit" | "unavailable")
        )
    })
}

/// Retry tuning for deploy stages
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before retry N+1; indexed by completed attempt count - 1
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        // Past the end of the schedule the last delay repeats; an empty
        // schedule retries immediately.
        self.backoff
            .get((attempt - 1) as usize)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::from_secs(30), Duration::from_secs(60)],
        }
    }
}

/// Terminal resolution of one stage, after any retries
#[derive(Debug)]
pub enum StageResolution {
    Success {
        attempts: Vec<StageAttempt>,
        output: StageBodyOutput,
    },
    HardFailure {
        attempts: Vec<StageAttempt>,
        classification: FailureClass,
        detail: String,
    },
    /// Only produced for verify stages
    NeedsRollback {
        attempts: Vec<StageAttempt>,
        detail: String,
    },
}

impl StageResolution {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> &[StageAttempt] {
        match self {
            Self::Success { attempts, .. }
            | Self::HardFailure { attempts, .. }
            | Self::NeedsRollback { attempts, .. } => attempts,
        }
    }
}

/// Applies the per-stage-kind failure policy around the executor
pub struct RetryController {
    policy: RetryPolicy,
    is_transient: TransientPredicate,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, is_transient: TransientPredicate) -> Self {
        Self {
            policy,
            is_transient,
        }
    }

    /// Runs a stage to terminal resolution, retrying deploys on transient
    /// failures per the configured policy
    pub async fn run_stage(
        &self,
        executor: &StageExecutor,
        spec: &StageSpec,
        timeout: Duration,
    ) -> StageResolution {
        let mut attempts: Vec<StageAttempt> = Vec::new();

        loop {
            let attempt_number = attempts.len() as u32 + 1;
            let started_at = chrono::Utc::now();
            let outcome = executor.run(spec, timeout).await;
            attempts.push(StageAttempt {
                number: attempt_number,
                started_at,
                ended_at: chrono::Utc::now(),
                outcome: outcome.status(),
                error: outcome.error_message(),
            });

            match outcome {
                StageOutcome::Success { output, .. } => {
                    return StageResolution::Success { attempts, output };
                }
                StageOutcome::TimedOut { limit } => {
                    let detail = format!("{} timed out after {limit:?}", spec.kind);
                    // A verify that ran out of time leaves the environment on
                    // an unverified artifact, same as a verify that failed.
                    if spec.kind == StageKind::Verify {
                        return StageResolution::NeedsRollback { attempts, detail };
                    }
                    return StageResolution::HardFailure {
                        attempts,
                        classification: FailureClass::Timeout,
                        detail,
                    };
                }
                StageOutcome::Failed { error, .. } => match spec.kind {
                    StageKind::Verify => {
                        return StageResolution::NeedsRollback {
                            attempts,
                            detail: error.message,
                        };
                    }
                    StageKind::Deploy => {
                        let transient = (self.is_transient)(&error);
                        if transient && attempt_number < self.policy.max_attempts {
                            let delay = self.policy.delay_after(attempt_number);
                            tracing::warn!(
                                stage = %spec.kind,
                                environment = spec.environment.as_deref().unwrap_or("-"),
                                attempt = attempt_number,
                                "transient deploy failure, retrying in {delay:?}: {}",
                                error.message
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        let classification = if transient {
                            // Retries exhausted
                            FailureClass::Transient
                        } else {
                            FailureClass::Terminal
                        };
                        return StageResolution::HardFailure {
                            attempts,
                            classification,
                            detail: error.message,
                        };
                    }
                    _ => {
                        return StageResolution::HardFailure {
                            attempts,
                            classification: FailureClass::Terminal,
                            detail: error.message,
                        };
                    }
                },
            }
        }
    }
}

/// Derives the stage status recorded for a terminal resolution
pub fn resolution_status(resolution: &StageResolution) -> StageStatus {
    match resolution {
        StageResolution::Success { .. } => StageStatus::Success,
        StageResolution::NeedsRollback { .. } => StageStatus::Failed,
        StageResolution::HardFailure {
            classification: FailureClass::Timeout,
            ..
        } => StageStatus::TimedOut,
        StageResolution::HardFailure { .. } => StageStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    use crate::executor::StageBody;

    /// Scripted body: fails with the queued errors, then succeeds
    struct ScriptedBody {
        failures: Mutex<Vec<StageBodyError>>,
        calls: AtomicU32,
    }

    impl ScriptedBody {
        fn failing_times(errors: Vec<StageBodyError>) -> Self {
            Self {
                failures: Mutex::new(errors),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl StageBody for ScriptedBody {
        async fn invoke(&self, _spec: &StageSpec) -> Result<StageBodyOutput, StageBodyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(StageBodyOutput::default())
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn spec(kind: StageKind) -> StageSpec {
        StageSpec {
            run_id: Uuid::new_v4(),
            kind,
            environment: Some("dev".into()),
            repository: "org/app".into(),
            commit_sha: "abc1234".into(),
            artifact_tag: Some("abc1234".into()),
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: vec![Duration::from_millis(1), Duration::from_millis(1)],
        }
    }

    fn controller(max_attempts: u32) -> RetryController {
        RetryController::new(fast_policy(max_attempts), signal_based_predicate())
    }

    #[tokio::test]
    async fn test_transient_deploy_retried_until_success() {
        let body = Arc::new(ScriptedBody::failing_times(vec![
            StageBodyError::with_signal("rate limited", "rate_limit"),
            StageBodyError::with_signal("rate limited", "rate_limit"),
        ]));
        let executor = StageExecutor::new(body.clone());
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Deploy), Duration::from_secs(5))
            .await;

        assert!(resolution.is_success());
        assert_eq!(resolution.attempts().len(), 3);
        assert_eq!(body.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_deploy_exhausts_attempts() {
        let body = Arc::new(ScriptedBody::failing_times(vec![
            StageBodyError::with_signal("down", "unavailable"),
            StageBodyError::with_signal("down", "unavailable"),
            StageBodyError::with_signal("down", "unavailable"),
        ]));
        let executor = StageExecutor::new(body);
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Deploy), Duration::from_secs(5))
            .await;

        match resolution {
            StageResolution::HardFailure {
                attempts,
                classification,
                ..
            } => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(classification, FailureClass::Transient);
            }
            other => panic!("expected hard failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminal_deploy_not_retried() {
        let body = Arc::new(ScriptedBody::failing_times(vec![
            StageBodyError::with_signal("quota exceeded", "quota"),
        ]));
        let executor = StageExecutor::new(body.clone());
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Deploy), Duration::from_secs(5))
            .await;

        match resolution {
            StageResolution::HardFailure { classification, .. } => {
                assert_eq!(classification, FailureClass::Terminal);
            }
            other => panic!("expected hard failure, got {other:?}"),
        }
        assert_eq!(body.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_build_failure_never_retried() {
        let body = Arc::new(ScriptedBody::failing_times(vec![
            StageBodyError::with_signal("flaky network", "network"),
        ]));
        let executor = StageExecutor::new(body.clone());
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Build), Duration::from_secs(5))
            .await;

        assert!(!resolution.is_success());
        assert_eq!(body.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verify_failure_requests_rollback() {
        let body = Arc::new(ScriptedBody::failing_times(vec![StageBodyError::new(
            "health probe failed",
        )]));
        let executor = StageExecutor::new(body);
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Verify), Duration::from_secs(5))
            .await;

        assert!(matches!(resolution, StageResolution::NeedsRollback { .. }));
    }

    /// Body that hangs well past any timeout used in these tests
    struct HangingBody;

    #[async_trait]
    impl StageBody for HangingBody {
        async fn invoke(&self, _spec: &StageSpec) -> Result<StageBodyOutput, StageBodyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(StageBodyOutput::default())
        }
    }

    #[tokio::test]
    async fn test_verify_timeout_requests_rollback() {
        let executor = StageExecutor::new(Arc::new(HangingBody));
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Verify), Duration::from_millis(10))
            .await;

        match resolution {
            StageResolution::NeedsRollback { attempts, .. } => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].outcome, StageStatus::TimedOut);
            }
            other => panic!("expected rollback request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deploy_timeout_is_a_hard_failure() {
        let executor = StageExecutor::new(Arc::new(HangingBody));
        let resolution = controller(3)
            .run_stage(&executor, &spec(StageKind::Deploy), Duration::from_millis(10))
            .await;

        match resolution {
            StageResolution::HardFailure { classification, .. } => {
                assert_eq!(classification, FailureClass::Timeout);
            }
            other => panic!("expected hard failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_backoff_retries_without_delay() {
        let body = Arc::new(ScriptedBody::failing_times(vec![
            StageBodyError::with_signal("down", "unavailable"),
        ]));
        let executor = StageExecutor::new(body.clone());
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: vec![],
        };
        let resolution = RetryController::new(policy, signal_based_predicate())
            .run_stage(&executor, &spec(StageKind::Deploy), Duration::from_secs(5))
            .await;

        assert!(resolution.is_success());
        assert_eq!(body.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_custom_predicate_is_honored() {
        // Treat everything as transient
        let all_transient: TransientPredicate = Arc::new(|_| true);
        let body = Arc::new(ScriptedBody::failing_times(vec![
            StageBodyError::with_signal("weird failure", "quota"),
        ]));
        let executor = StageExecutor::new(body.clone());
        let controller = RetryController::new(fast_policy(2), all_transient);
        let resolution = controller
            .run_stage(&executor, &spec(StageKind::Deploy), Duration::from_secs(5))
            .await;

        assert!(resolution.is_success());
        assert_eq!(body.calls.load(Ordering::SeqCst), 2);
    }
}
