//! Persistence seams
//!
//! The engine reads and writes run state through these traits so the
//! orchestrator can back them with a database while tests use the
//! in-memory implementations. Persisting the approval request is what
//! makes the production suspension survive a process restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use cascade_core::domain::artifact::Artifact;
use cascade_core::domain::environment::Environment;
use cascade_core::domain::promotion::{ApprovalRequest, ApprovalState, PromotionRecord};
use cascade_core::domain::run::{PipelineRun, RunStatus};
use cascade_core::domain::scan::ScanReport;
use cascade_core::domain::stage::Stage;
use cascade_core::error::EngineError;

/// Run, stage, artifact, and promotion persistence
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert_run(&self, run: &PipelineRun) -> Result<(), EngineError>;
    async fn update_run(&self, run: &PipelineRun) -> Result<(), EngineError>;
    async fn fetch_run(&self, id: Uuid) -> Result<Option<PipelineRun>, EngineError>;

    /// Most recent runs first, up to `limit`
    async fn list_runs(&self, limit: usize) -> Result<Vec<PipelineRun>, EngineError>;

    async fn upsert_stage(&self, stage: &Stage) -> Result<(), EngineError>;
    async fn fetch_stages(&self, run_id: Uuid) -> Result<Vec<Stage>, EngineError>;

    async fn insert_artifact(&self, run_id: Uuid, artifact: &Artifact) -> Result<(), EngineError>;
    async fn fetch_artifact(&self, run_id: Uuid) -> Result<Option<Artifact>, EngineError>;

    /// Writes a promotion record, replacing any existing record with the
    /// same id (a record pending approval is settled in place)
    async fn insert_promotion(&self, record: &PromotionRecord) -> Result<(), EngineError>;
    async fn fetch_promotion(&self, id: Uuid) -> Result<Option<PromotionRecord>, EngineError>;

    async fn record_scan(&self, report: &ScanReport) -> Result<(), EngineError>;
    async fn latest_scan(&self, artifact_tag: &str) -> Result<Option<ScanReport>, EngineError>;
}

/// Environment state persistence with optimistic concurrency
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Option<Environment>, EngineError>;
    async fn list(&self) -> Result<Vec<Environment>, EngineError>;
    async fn upsert(&self, environment: &Environment) -> Result<(), EngineError>;

    /// Writes the deployed pointer and history, succeeding only when the
    /// stored version still equals `expected_version`
    async fn compare_and_update(
        &self,
        environment: &Environment,
        expected_version: u64,
    ) -> Result<(), EngineError>;
}

/// Approval request persistence
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert(&self, request: &ApprovalRequest) -> Result<(), EngineError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<ApprovalRequest>, EngineError>;
    async fn update(&self, request: &ApprovalRequest) -> Result<(), EngineError>;
    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, EngineError>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// In-memory run store for tests and local development
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<Uuid, PipelineRun>>,
    stages: Mutex<HashMap<Uuid, Vec<Stage>>>,
    artifacts: Mutex<HashMap<Uuid, Artifact>>,
    promotions: Mutex<Vec<PromotionRecord>>,
    scans: Mutex<Vec<ScanReport>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All promotion records, for assertions in tests
    pub fn promotions(&self) -> Vec<PromotionRecord> {
        self.promotions.lock().expect("store poisoned").clone()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn insert_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        self.runs
            .lock()
            .expect("store poisoned")
            .insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        self.runs
            .lock()
            .expect("store poisoned")
            .insert(run.id, run.clone());
        Ok(())
    }

    async fn fetch_run(&self, id: Uuid) -> Result<Option<PipelineRun>, EngineError> {
        Ok(self.runs.lock().expect("store poisoned").get(&id).cloned())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<PipelineRun>, EngineError> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .lock()
            .expect("store poisoned")
            .values()
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn upsert_stage(&self, stage: &Stage) -> Result<(), EngineError> {
        let mut stages = self.stages.lock().expect("store poisoned");
        let list = stages.entry(stage.run_id).or_default();
        match list.iter_mut().find(|s| s.id == stage.id) {
            Some(existing) => *existing = stage.clone(),
            None => list.push(stage.clone()),
        }
        Ok(())
    }

    async fn fetch_stages(&self, run_id: Uuid) -> Result<Vec<Stage>, EngineError> {
        Ok(self
            .stages
            .lock()
            .expect("store poisoned")
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_artifact(&self, run_id: Uuid, artifact: &Artifact) -> Result<(), EngineError> {
        self.artifacts
            .lock()
            .expect("store poisoned")
            .insert(run_id, artifact.clone());
        Ok(())
    }

    async fn fetch_artifact(&self, run_id: Uuid) -> Result<Option<Artifact>, EngineError> {
        Ok(self
            .artifacts
            .lock()
            .expect("store poisoned")
            .get(&run_id)
            .cloned())
    }

    async fn insert_promotion(&self, record: &PromotionRecord) -> Result<(), EngineError> {
        let mut promotions = self.promotions.lock().expect("store poisoned");
        match promotions.iter_mut().find(|p| p.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => promotions.push(record.clone()),
        }
        Ok(())
    }

    async fn fetch_promotion(&self, id: Uuid) -> Result<Option<PromotionRecord>, EngineError> {
        Ok(self
            .promotions
            .lock()
            .expect("store poisoned")
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn record_scan(&self, report: &ScanReport) -> Result<(), EngineError> {
        self.scans
            .lock()
            .expect("store poisoned")
            .push(report.clone());
        Ok(())
    }

    async fn latest_scan(&self, artifact_tag: &str) -> Result<Option<ScanReport>, EngineError> {
        Ok(self
            .scans
            .lock()
            .expect("store poisoned")
            .iter()
            .filter(|s| s.artifact_tag == artifact_tag)
            .max_by_key(|s| s.completed_at)
            .cloned())
    }
}

/// In-memory environment store with version checking
#[derive(Default)]
pub struct InMemoryEnvironmentStore {
    environments: Mutex<HashMap<String, Environment>>,
}

impl InMemoryEnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a set of environments
    pub fn with_environments(environments: Vec<Environment>) -> Self {
        let map = environments
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();
        Self {
            environments: Mutex::new(map),
        }
    }
}

#[async_trait]
impl EnvironmentStore for InMemoryEnvironmentStore {
    async fn fetch(&self, name: &str) -> Result<Option<Environment>, EngineError> {
        Ok(self
            .environments
            .lock()
            .expect("store poisoned")
            .get(name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Environment>, EngineError> {
        let mut environments: Vec<Environment> = self
            .environments
            .lock()
            .expect("store poisoned")
            .values()
            .cloned()
            .collect();
        environments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(environments)
    }

    async fn upsert(&self, environment: &Environment) -> Result<(), EngineError> {
        self.environments
            .lock()
            .expect("store poisoned")
            .insert(environment.name.clone(), environment.clone());
        Ok(())
    }

    async fn compare_and_update(
        &self,
        environment: &Environment,
        expected_version: u64,
    ) -> Result<(), EngineError> {
        let mut environments = self.environments.lock().expect("store poisoned");
        match environments.get(&environment.name) {
            Some(current) if current.version != expected_version => Err(EngineError::Store(
                format!(
                    "environment '{}' version conflict: expected {expected_version}, found {}",
                    environment.name, current.version
                ),
            )),
            _ => {
                environments.insert(environment.name.clone(), environment.clone());
                Ok(())
            }
        }
    }
}

/// In-memory approval store
#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: Mutex<HashMap<Uuid, ApprovalRequest>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn insert(&self, request: &ApprovalRequest) -> Result<(), EngineError> {
        self.requests
            .lock()
            .expect("store poisoned")
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ApprovalRequest>, EngineError> {
        Ok(self
            .requests
            .lock()
            .expect("store poisoned")
            .get(&id)
            .cloned())
    }

    async fn update(&self, request: &ApprovalRequest) -> Result<(), EngineError> {
        self.requests
            .lock()
            .expect("store poisoned")
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, EngineError> {
        Ok(self
            .requests
            .lock()
            .expect("store poisoned")
            .values()
            .filter(|r| r.state == ApprovalState::Requested)
            .cloned()
            .collect())
    }
}

/// Marks a run terminal with the given status
pub fn finish_run(run: &mut PipelineRun, status: RunStatus) {
    run.status = status;
    run.finished_at = Some(chrono::Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::domain::environment::ProtectionPolicy;
    use cascade_core::domain::run::TriggerKind;

    #[tokio::test]
    async fn test_compare_and_update_detects_conflict() {
        let store = InMemoryEnvironmentStore::with_environments(vec![Environment::new(
            "dev",
            vec![],
            ProtectionPolicy::auto(),
        )]);

        let mut env = store.fetch("dev").await.unwrap().unwrap();
        let expected = env.version;
        env.version += 1;
        assert!(store.compare_and_update(&env, expected).await.is_ok());

        // A writer holding the stale version must fail
        let mut stale = env.clone();
        stale.version += 1;
        let err = store.compare_and_update(&stale, expected).await;
        assert!(matches!(err, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_latest_scan_picks_most_recent() {
        let store = InMemoryRunStore::new();
        let older = ScanReport {
            artifact_tag: "abc1234".into(),
            critical_findings: 2,
            total_findings: 5,
            completed_at: chrono::Utc::now() - chrono::Duration::hours(1),
        };
        let newer = ScanReport {
            artifact_tag: "abc1234".into(),
            critical_findings: 0,
            total_findings: 1,
            completed_at: chrono::Utc::now(),
        };
        store.record_scan(&older).await.unwrap();
        store.record_scan(&newer).await.unwrap();

        let latest = store.latest_scan("abc1234").await.unwrap().unwrap();
        assert_eq!(latest.critical_findings, 0);
        assert!(store.latest_scan("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_run_sets_timestamp() {
        let mut run = PipelineRun::new("org/app", "main", "abc1234", TriggerKind::Push);
        finish_run(&mut run, RunStatus::Succeeded);
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(run.finished_at.is_some());
    }
}
