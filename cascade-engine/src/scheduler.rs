//! Environment scheduler
//!
//! Enforces the per-environment concurrency rules: at most one
//! deploy+verify pair runs against an environment at a time, newer
//! queued requests cancel older queued ones for the same non-production
//! environment, production requests are strictly FIFO, and queued
//! requests expire after a configured window. A running deploy or verify
//! is never cancelled mid-flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// One queued deployment request
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub run_id: Uuid,
    pub environment: String,
    pub commit_sha: String,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

/// Why a queued request never got to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// Superseded by a newer request for the same environment
    Cancelled,
    /// Sat queued past the expiry window
    Expired,
}

/// Holding this permit makes the caller the sole deployer for the
/// environment; dropping it releases the lock
#[derive(Debug)]
pub struct EnvPermit {
    _guard: OwnedMutexGuard<()>,
}

struct QueueState {
    /// Pending request ids per environment, oldest first.
    queued: HashMap<String, Vec<DeployRequest>>,
}

/// Per-environment mutual exclusion plus admission queueing
pub struct EnvironmentScheduler {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    state: Mutex<QueueState>,
    queue_expiry: Duration,
}

impl EnvironmentScheduler {
    pub fn new(queue_expiry: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            state: Mutex::new(QueueState {
                queued: HashMap::new(),
            }),
            queue_expiry,
        }
    }

    fn lock_for(&self, environment: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("scheduler lock poisoned");
        locks
            .entry(environment.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Enqueues the request, then waits for the environment lock
    ///
    /// For non-production environments, enqueueing cancels any older
    /// still-queued request; the cancelled waiter learns its fate when it
    /// acquires the lock and finds its entry gone. Production requests
    /// queue strictly FIFO and are never auto-cancelled.
    pub async fn admit(&self, request: DeployRequest) -> Result<EnvPermit, AdmissionError> {
        let production = request.environment == "production";

        {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            let queue = state.queued.entry(request.environment.clone()).or_default();
            if !production {
                for stale in queue.drain(..) {
                    tracing::info!(
                        run_id = %stale.run_id,
                        environment = %stale.environment,
                        "queued deployment superseded by newer run"
                    );
                }
            }
            queue.push(request.clone());
        }

        let lock = self.lock_for(&request.environment);
        let guard = lock.lock_owned().await;

        // Holding the lock: check we are still wanted and not expired
        let mut state = self.state.lock().expect("scheduler state poisoned");
        let queue = state.queued.entry(request.environment.clone()).or_default();
        let position = queue.iter().position(|r| r.run_id == request.run_id);
        match position {
            None => Err(AdmissionError::Cancelled),
            Some(idx) => {
                let entry = queue.remove(idx);
                let age = chrono::Utc::now() - entry.enqueued_at;
                let expiry = chrono::Duration::from_std(self.queue_expiry)
                    .unwrap_or_else(|_| chrono::Duration::minutes(60));
                if age > expiry {
                    tracing::warn!(
                        run_id = %entry.run_id,
                        environment = %entry.environment,
                        "queued deployment expired before it could start"
                    );
                    Err(AdmissionError::Expired)
                } else {
                    Ok(EnvPermit { _guard: guard })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(env: &str, sha: &str) -> DeployRequest {
        DeployRequest {
            run_id: Uuid::new_v4(),
            environment: env.to_string(),
            commit_sha: sha.to_string(),
            enqueued_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_single_flight_per_environment() {
        let scheduler = Arc::new(EnvironmentScheduler::new(Duration::from_secs(3600)));

        let permit = scheduler.admit(request("dev", "aaa1111")).await.unwrap();

        // A second admit for the same environment must not complete while
        // the permit is held.
        let scheduler2 = scheduler.clone();
        let second = tokio::spawn(async move { scheduler2.admit(request("production", "bbb2222")).await });
        let blocked = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.admit(request("dev", "bbb2222")).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());
        // Different environment is unaffected
        assert!(second.await.unwrap().is_ok());

        drop(permit);
        assert!(blocked.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_newer_request_cancels_queued_older_one() {
        let scheduler = Arc::new(EnvironmentScheduler::new(Duration::from_secs(3600)));

        let permit = scheduler.admit(request("dev", "aaa1111")).await.unwrap();

        let older = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.admit(request("dev", "bbb2222")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let newer = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.admit(request("dev", "ccc3333")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(permit);

        assert_eq!(older.await.unwrap().unwrap_err(), AdmissionError::Cancelled);
        assert!(newer.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_production_requests_are_never_cancelled() {
        let scheduler = Arc::new(EnvironmentScheduler::new(Duration::from_secs(3600)));

        let permit = scheduler
            .admit(request("production", "aaa1111"))
            .await
            .unwrap();

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.admit(request("production", "bbb2222")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.admit(request("production", "ccc3333")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(permit);
        let first = first.await.unwrap();
        assert!(first.is_ok());
        drop(first);
        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stale_queued_request_expires() {
        let scheduler = Arc::new(EnvironmentScheduler::new(Duration::from_millis(10)));

        let permit = scheduler
            .admit(request("production", "aaa1111"))
            .await
            .unwrap();

        let queued = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.admit(request("production", "bbb2222")).await }
        });

        // Hold the lock past the expiry window
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(permit);

        assert_eq!(queued.await.unwrap().unwrap_err(), AdmissionError::Expired);
    }
}
