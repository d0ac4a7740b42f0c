//! Postgres-backed engine store implementations
//!
//! Thin adapters binding the engine's persistence seams to the
//! repository layer. Database errors surface as store errors; the engine
//! never sees sqlx types.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use cascade_core::domain::artifact::Artifact;
use cascade_core::domain::environment::Environment;
use cascade_core::domain::promotion::{ApprovalRequest, PromotionRecord};
use cascade_core::domain::run::PipelineRun;
use cascade_core::domain::scan::ScanReport;
use cascade_core::domain::stage::Stage;
use cascade_core::error::EngineError;
use cascade_engine::ledger::ArtifactRegistry;
use cascade_engine::store::{ApprovalStore, EnvironmentStore, RunStore};

use crate::repository::{
    approval_repository, environment_repository, registry_repository, run_repository,
};

fn store_err(err: sqlx::Error) -> EngineError {
    EngineError::Store(err.to_string())
}

/// Run persistence over Postgres
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn insert_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        run_repository::insert(&self.pool, run).await.map_err(store_err)
    }

    async fn update_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        run_repository::update(&self.pool, run).await.map_err(store_err)
    }

    async fn fetch_run(&self, id: Uuid) -> Result<Option<PipelineRun>, EngineError> {
        run_repository::find_by_id(&self.pool, id).await.map_err(store_err)
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<PipelineRun>, EngineError> {
        run_repository::list_recent(&self.pool, limit).await.map_err(store_err)
    }

    async fn upsert_stage(&self, stage: &Stage) -> Result<(), EngineError> {
        run_repository::upsert_stage(&self.pool, stage).await.map_err(store_err)
    }

    async fn fetch_stages(&self, run_id: Uuid) -> Result<Vec<Stage>, EngineError> {
        run_repository::list_stages(&self.pool, run_id).await.map_err(store_err)
    }

    async fn insert_artifact(&self, run_id: Uuid, artifact: &Artifact) -> Result<(), EngineError> {
        run_repository::upsert_artifact(&self.pool, run_id, artifact)
            .await
            .map_err(store_err)
    }

    async fn fetch_artifact(&self, run_id: Uuid) -> Result<Option<Artifact>, EngineError> {
        run_repository::find_artifact(&self.pool, run_id).await.map_err(store_err)
    }

    async fn insert_promotion(&self, record: &PromotionRecord) -> Result<(), EngineError> {
        run_repository::insert_promotion(&self.pool, record).await.map_err(store_err)
    }

    async fn fetch_promotion(&self, id: Uuid) -> Result<Option<PromotionRecord>, EngineError> {
        run_repository::find_promotion(&self.pool, id).await.map_err(store_err)
    }

    async fn record_scan(&self, report: &ScanReport) -> Result<(), EngineError> {
        run_repository::insert_scan(&self.pool, report).await.map_err(store_err)
    }

    async fn latest_scan(&self, artifact_tag: &str) -> Result<Option<ScanReport>, EngineError> {
        run_repository::latest_scan(&self.pool, artifact_tag)
            .await
            .map_err(store_err)
    }
}

/// Environment persistence over Postgres
#[derive(Clone)]
pub struct PgEnvironmentStore {
    pool: PgPool,
}

impl PgEnvironmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnvironmentStore for PgEnvironmentStore {
    async fn fetch(&self, name: &str) -> Result<Option<Environment>, EngineError> {
        environment_repository::find_by_name(&self.pool, name)
            .await
            .map_err(store_err)
    }

    async fn list(&self) -> Result<Vec<Environment>, EngineError> {
        environment_repository::list_all(&self.pool).await.map_err(store_err)
    }

    async fn upsert(&self, environment: &Environment) -> Result<(), EngineError> {
        environment_repository::upsert(&self.pool, environment)
            .await
            .map_err(store_err)
    }

    async fn compare_and_update(
        &self,
        environment: &Environment,
        expected_version: u64,
    ) -> Result<(), EngineError> {
        let updated =
            environment_repository::compare_and_update(&self.pool, environment, expected_version)
                .await
                .map_err(store_err)?;

        if updated {
            Ok(())
        } else {
            Err(EngineError::Store(format!(
                "environment '{}' version conflict at {expected_version}",
                environment.name
            )))
        }
    }
}

/// Approval persistence over Postgres
#[derive(Clone)]
pub struct PgApprovalStore {
    pool: PgPool,
}

impl PgApprovalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalStore for PgApprovalStore {
    async fn insert(&self, request: &ApprovalRequest) -> Result<(), EngineError> {
        approval_repository::insert(&self.pool, request).await.map_err(store_err)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ApprovalRequest>, EngineError> {
        approval_repository::find_by_id(&self.pool, id).await.map_err(store_err)
    }

    async fn update(&self, request: &ApprovalRequest) -> Result<(), EngineError> {
        approval_repository::update(&self.pool, request).await.map_err(store_err)
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, EngineError> {
        approval_repository::list_pending(&self.pool).await.map_err(store_err)
    }
}

/// Registry tag index over Postgres
#[derive(Clone)]
pub struct PgArtifactRegistry {
    pool: PgPool,
}

impl PgArtifactRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRegistry for PgArtifactRegistry {
    async fn exists(&self, tag: &str) -> Result<Option<String>, EngineError> {
        registry_repository::find_tag(&self.pool, tag).await.map_err(store_err)
    }

    async fn publish(
        &self,
        tag: &str,
        digest: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), EngineError> {
        registry_repository::publish_tag(&self.pool, tag, digest, metadata)
            .await
            .map_err(store_err)
    }

    async fn read_metadata(&self, tag: &str) -> Result<HashMap<String, String>, EngineError> {
        registry_repository::read_metadata(&self.pool, tag)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::Validation(format!("unknown tag '{tag}'")))
    }
}
