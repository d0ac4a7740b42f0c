//! Pipeline coordinator
//!
//! Top-level driver owning a run's lifecycle. Sequences the stage graph
//! (validate -> build -> {test, scan} -> deploy -> verify per
//! environment), enforces per-environment mutual exclusion through the
//! scheduler, and suspends at the production approval gate by persisting
//! an approval request and returning; `resume` continues the run once a
//! decision arrives. The coordinator only ever sees classified, terminal
//! stage resolutions.

use std::sync::Arc;
use uuid::Uuid;

use cascade_core::domain::artifact::{Artifact, ArtifactState, is_valid_commit_sha};
use cascade_core::domain::environment::{DeploymentRecord, Environment};
use cascade_core::domain::promotion::{
    ApprovalRequest, ApprovalState, BlockReason, PromotionDecision, PromotionRecord,
};
use cascade_core::domain::run::{PipelineRun, RunStatus};
use cascade_core::domain::stage::{FailureClass, Stage, StageKind, StageStatus};
use cascade_core::dto::run::TriggerRun;
use cascade_core::error::EngineError;

use crate::config::EngineConfig;
use crate::credentials::TokenExchange;
use crate::executor::{StageExecutor, StageSpec};
use crate::gate::{EligibilityInput, PromotionGate};
use crate::ledger::ArtifactLedger;
use crate::policy::{self, Ruleset};
use crate::resolver::BranchResolver;
use crate::retry::{RetryController, StageResolution, resolution_status};
use crate::scheduler::{AdmissionError, DeployRequest, EnvironmentScheduler};
use crate::store::{ApprovalStore, EnvironmentStore, RunStore, finish_run};

/// Where a driven run ended up
#[derive(Debug)]
pub enum RunProgress {
    /// The run reached a terminal status
    Completed(PipelineRun),
    /// The run is waiting on a human approval decision
    Suspended {
        run: PipelineRun,
        approval: ApprovalRequest,
    },
}

impl RunProgress {
    pub fn run(&self) -> &PipelineRun {
        match self {
            Self::Completed(run) | Self::Suspended { run, .. } => run,
        }
    }
}

/// Collaborators and state the coordinator drives
pub struct Coordinator {
    config: EngineConfig,
    executor: StageExecutor,
    retry: RetryController,
    resolver: BranchResolver,
    gate: PromotionGate,
    ledger: ArtifactLedger,
    ruleset: Ruleset,
    scheduler: Arc<EnvironmentScheduler>,
    runs: Arc<dyn RunStore>,
    environments: Arc<dyn EnvironmentStore>,
    approvals: Arc<dyn ApprovalStore>,
    tokens: Arc<dyn TokenExchange>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        executor: StageExecutor,
        retry: RetryController,
        resolver: BranchResolver,
        gate: PromotionGate,
        ledger: ArtifactLedger,
        ruleset: Ruleset,
        scheduler: Arc<EnvironmentScheduler>,
        runs: Arc<dyn RunStore>,
        environments: Arc<dyn EnvironmentStore>,
        approvals: Arc<dyn ApprovalStore>,
        tokens: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            config,
            executor,
            retry,
            resolver,
            gate,
            ledger,
            ruleset,
            scheduler,
            runs,
            environments,
            approvals,
            tokens,
        }
    }

    /// Validates the trigger and materializes the run without executing
    /// anything, so callers can hand back the run id before the long
    /// drive begins
    pub fn plan(&self, request: &TriggerRun) -> Result<PipelineRun, EngineError> {
        if !is_valid_commit_sha(&request.commit_sha) {
            return Err(EngineError::Validation(format!(
                "malformed commit SHA '{}'",
                request.commit_sha
            )));
        }

        let mut run = PipelineRun::new(
            &request.repository,
            &request.branch,
            &request.commit_sha,
            request.trigger,
        );
        run.target_environments = self.resolver.resolve(&request.branch);
        run.status = RunStatus::Running;
        Ok(run)
    }

    /// Drives a freshly triggered run as far as it can go without human
    /// input
    pub async fn start(&self, request: TriggerRun) -> Result<RunProgress, EngineError> {
        let run = self.plan(&request)?;
        self.runs.insert_run(&run).await?;
        self.drive(run, request).await
    }

    /// Drives an already-persisted run to completion or suspension
    pub async fn drive(
        &self,
        mut run: PipelineRun,
        request: TriggerRun,
    ) -> Result<RunProgress, EngineError> {
        tracing::info!(
            run_id = %run.id,
            branch = %run.branch,
            environments = ?run.target_environments,
            "pipeline run started"
        );

        // Validate: policy evaluation over the workflow document. A deny
        // rule vetoes the run before build.
        if let Err(err) = self.run_validate_stage(&run, &request).await {
            finish_run(&mut run, RunStatus::Failed);
            self.runs.update_run(&run).await?;
            return Err(err);
        }

        // Build, then seal the artifact
        let artifact = match self.run_build_stage(&run).await {
            Ok(artifact) => artifact,
            Err(err) => {
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                return Err(err);
            }
        };
        self.runs.insert_artifact(run.id, &artifact).await?;

        // Test and scan fan out in parallel; both must succeed before any
        // deploy is scheduled.
        if let Err(err) = self.run_test_and_scan(&run, &artifact).await {
            finish_run(&mut run, RunStatus::Failed);
            self.runs.update_run(&run).await?;
            return Err(err);
        }

        if run.target_environments.is_empty() {
            // Valid terminal state for unmatched branches: build, test,
            // and scan ran, nothing deploys.
            tracing::info!(run_id = %run.id, "no target environments, run complete");
            finish_run(&mut run, RunStatus::Succeeded);
            self.runs.update_run(&run).await?;
            return Ok(RunProgress::Completed(run));
        }

        self.promote_through_environments(run, artifact, 0).await
    }

    /// Continues a run suspended at the production approval gate
    ///
    /// The approval decision (or expiry) must already be recorded on the
    /// request; this applies its consequence to the run.
    pub async fn resume(&self, approval_id: Uuid) -> Result<RunProgress, EngineError> {
        let mut approval = self
            .approvals
            .fetch(approval_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown approval {approval_id}")))?;

        let mut run = self
            .runs
            .fetch_run(approval.run_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown run {}", approval.run_id)))?;

        let artifact = self
            .runs
            .fetch_artifact(run.id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("run {} has no artifact", run.id)))?;

        // A stopped expiry sweeper must not admit a stale approval
        let now = chrono::Utc::now();
        if approval.is_expired_at(now) {
            approval.state = ApprovalState::Expired;
            approval.decided_at = Some(now);
            self.approvals.update(&approval).await?;
        }

        match approval.state {
            ApprovalState::Requested => Err(EngineError::Validation(format!(
                "approval {approval_id} has no decision yet"
            ))),
            ApprovalState::Rejected => {
                self.record_approval_outcome(&approval, BlockReason::ApprovalRejected)
                    .await?;
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                Ok(RunProgress::Completed(run))
            }
            ApprovalState::Expired => {
                self.record_approval_outcome(&approval, BlockReason::ApprovalExpired)
                    .await?;
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                Ok(RunProgress::Completed(run))
            }
            ApprovalState::Approved => {
                let pending = self.fetch_pending_promotion(&approval).await?;
                self.promote_through_environments_approved(run, artifact, pending, approval)
                    .await
            }
        }
    }

    /// Operator-initiated promotion of a run's artifact into one of its
    /// target environments
    ///
    /// The full eligibility gate runs again, so this is how a run halted
    /// at a boundary (soak not elapsed, scan missing) is moved forward
    /// once the condition clears. Promotion continues through any
    /// remaining environments in the chain.
    pub async fn promote(&self, run_id: Uuid, to_env: &str) -> Result<RunProgress, EngineError> {
        let mut run = self
            .runs
            .fetch_run(run_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown run {run_id}")))?;

        let artifact = self.runs.fetch_artifact(run_id).await?.ok_or_else(|| {
            EngineError::Validation(format!("run {run_id} has no published artifact"))
        })?;

        let index = run
            .target_environments
            .iter()
            .position(|name| name == to_env)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "environment '{to_env}' is not a target of run {run_id}"
                ))
            })?;

        tracing::info!(run_id = %run.id, to_env, "manual promotion requested");

        run.status = RunStatus::Running;
        run.finished_at = None;
        self.runs.update_run(&run).await?;

        // Precheck so an ineligible manual promotion surfaces as an error
        // instead of a silently failed run. Soak/scan blocks on an
        // approval-protected environment still defer to the approval flow.
        let target = self.fetch_environment(to_env).await?;
        let from_env = match index {
            0 => None,
            _ => Some(
                self.fetch_environment(&run.target_environments[index - 1])
                    .await?,
            ),
        };
        let scan = self.runs.latest_scan(&artifact.tag).await?;
        let record = self.gate.check_eligibility(&EligibilityInput {
            run_id: run.id,
            artifact: &artifact,
            from_env: from_env.as_ref(),
            to_env: &target,
            scan: scan.as_ref(),
            now: chrono::Utc::now(),
        });

        if let Some(reason) = record.block_reason {
            let deferred = target.policy.requires_approval()
                && matches!(
                    reason,
                    BlockReason::SoakTimeNotElapsed | BlockReason::ScanMissing
                );
            if !deferred {
                self.runs.insert_promotion(&record).await?;
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                return Err(EngineError::PromotionBlocked {
                    from_env: record.from_env,
                    to_env: record.to_env,
                    reason,
                });
            }
        }

        self.promote_through_environments(run, artifact, index).await
    }

    /// Operator-initiated rollback of an environment to its previous
    /// verified artifact
    pub async fn manual_rollback(&self, environment: &str) -> Result<(), EngineError> {
        let env = self
            .environments
            .fetch(environment)
            .await?
            .ok_or_else(|| {
                EngineError::TerminalInfrastructure(format!("unknown environment '{environment}'"))
            })?;

        let previous = env.previous_deployment().cloned().ok_or_else(|| {
            EngineError::RollbackFailure {
                environment: environment.to_string(),
                message: "no previous verified deployment to roll back to".to_string(),
            }
        })?;

        let request = DeployRequest {
            run_id: previous.run_id,
            environment: environment.to_string(),
            commit_sha: previous.artifact_tag.clone(),
            enqueued_at: chrono::Utc::now(),
        };
        let _permit = self.scheduler.admit(request).await.map_err(|e| {
            EngineError::TerminalInfrastructure(format!("rollback not admitted: {e:?}"))
        })?;

        let mut env = self
            .environments
            .fetch(environment)
            .await?
            .ok_or_else(|| {
                EngineError::TerminalInfrastructure(format!("unknown environment '{environment}'"))
            })?;

        self.redeploy_previous(&mut env, &previous).await?;

        let expected = env.version;
        env.record_deployment(
            DeploymentRecord {
                artifact_tag: previous.artifact_tag.clone(),
                digest: previous.digest.clone(),
                run_id: previous.run_id,
                deployed_at: chrono::Utc::now(),
                verified: true,
            },
            self.config.history_limit,
        );
        self.environments.compare_and_update(&env, expected).await?;
        tracing::info!(environment, tag = %previous.artifact_tag, "manual rollback complete");
        Ok(())
    }

    // =========================================================================
    // Stage drivers
    // =========================================================================

    async fn run_validate_stage(
        &self,
        run: &PipelineRun,
        request: &TriggerRun,
    ) -> Result<(), EngineError> {
        let mut stage = Stage::new(run.id, StageKind::Validate, None);
        stage.status = StageStatus::Running;
        stage.started_at = Some(chrono::Utc::now());
        self.runs.upsert_stage(&stage).await?;

        let evaluation = policy::evaluate(&request.workflow, &self.ruleset);

        stage.ended_at = Some(chrono::Utc::now());
        if evaluation.allowed {
            stage.status = StageStatus::Success;
            self.runs.upsert_stage(&stage).await?;
            Ok(())
        } else {
            stage.status = StageStatus::Failed;
            stage.classification = Some(FailureClass::PolicyDenied);
            self.runs.upsert_stage(&stage).await?;
            let (rule, message) = evaluation
                .denials()
                .next()
                .map(|d| (d.rule.clone(), d.message.clone()))
                .unwrap_or_else(|| ("policy".to_string(), "workflow denied".to_string()));
            Err(EngineError::PolicyViolation { rule, message })
        }
    }

    async fn run_build_stage(&self, run: &PipelineRun) -> Result<Artifact, EngineError> {
        let spec = self.stage_spec(run, StageKind::Build, None, None);
        let resolution = self.drive_stage(run, &spec).await?;

        match resolution {
            StageResolution::Success { output, .. } => {
                let digest = output.digest.ok_or_else(|| {
                    EngineError::TerminalInfrastructure(
                        "build stage reported no content digest".to_string(),
                    )
                })?;
                let metadata =
                    Artifact::build_metadata(&run.commit_sha, &run.repository, run.id);
                self.ledger
                    .publish(&run.repository, &run.commit_sha, &digest, metadata)
                    .await
            }
            StageResolution::HardFailure { detail, .. } => {
                Err(EngineError::TerminalInfrastructure(format!(
                    "build failed: {detail}"
                )))
            }
            StageResolution::NeedsRollback { .. } => unreachable!("build never rolls back"),
        }
    }

    async fn run_test_and_scan(
        &self,
        run: &PipelineRun,
        artifact: &Artifact,
    ) -> Result<(), EngineError> {
        let test_spec = self.stage_spec(run, StageKind::Test, None, Some(&artifact.tag));
        let scan_spec = self.stage_spec(run, StageKind::Scan, None, Some(&artifact.tag));

        let (test, scan) = tokio::join!(
            self.drive_stage(run, &test_spec),
            self.drive_stage(run, &scan_spec)
        );
        let (test, scan) = (test?, scan?);

        for (kind, resolution) in [(StageKind::Test, &test), (StageKind::Scan, &scan)] {
            if let StageResolution::HardFailure { detail, .. } = resolution {
                return Err(EngineError::TerminalInfrastructure(format!(
                    "{kind} failed: {detail}"
                )));
            }
        }
        Ok(())
    }

    /// Promotes the artifact through `run.target_environments[start..]`
    async fn promote_through_environments(
        &self,
        mut run: PipelineRun,
        artifact: Artifact,
        start: usize,
    ) -> Result<RunProgress, EngineError> {
        let environments = run.target_environments.clone();
        let mut artifact = artifact;

        for index in start..environments.len() {
            let to_name = &environments[index];
            let to_env = self.fetch_environment(to_name).await?;
            let from_env = match index {
                0 => None,
                _ => Some(self.fetch_environment(&environments[index - 1]).await?),
            };

            let scan = self.runs.latest_scan(&artifact.tag).await?;
            let now = chrono::Utc::now();
            let mut record = self.gate.check_eligibility(&EligibilityInput {
                run_id: run.id,
                artifact: &artifact,
                from_env: from_env.as_ref(),
                to_env: &to_env,
                scan: scan.as_ref(),
                now,
            });

            if to_env.policy.requires_approval() {
                // Time-dependent blocks (soak, missing scan) are re-checked
                // at resume; anything else fails the promotion now.
                match record.block_reason {
                    Some(BlockReason::SoakTimeNotElapsed) | Some(BlockReason::ScanMissing) | None => {
                        // The pending record is persisted now so the approval
                        // keeps a resolvable promotion reference while the run
                        // is suspended; resume settles it in place.
                        record.decided_at = None;
                        let approval = self.gate.open_approval(&record, now);
                        self.runs.insert_promotion(&record).await?;
                        self.approvals.insert(&approval).await?;
                        self.runs.update_run(&run).await?;
                        tracing::info!(
                            run_id = %run.id,
                            environment = %to_env.name,
                            approval_id = %approval.id,
                            "run suspended pending approval"
                        );
                        return Ok(RunProgress::Suspended { run, approval });
                    }
                    Some(_) => {
                        self.runs.insert_promotion(&record).await?;
                        finish_run(&mut run, RunStatus::Failed);
                        self.runs.update_run(&run).await?;
                        return Ok(RunProgress::Completed(run));
                    }
                }
            }

            self.runs.insert_promotion(&record).await?;
            if record.decision != PromotionDecision::Allowed {
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                return Ok(RunProgress::Completed(run));
            }

            match self.deploy_and_verify(&run, &mut artifact, &to_env.name).await {
                Ok(()) => {}
                Err(DeployError::Cancelled) => {
                    finish_run(&mut run, RunStatus::Cancelled);
                    self.runs.update_run(&run).await?;
                    return Ok(RunProgress::Completed(run));
                }
                Err(DeployError::Failed(err)) => {
                    finish_run(&mut run, RunStatus::Failed);
                    self.runs.update_run(&run).await?;
                    return Err(err);
                }
                Err(DeployError::RolledBack) => {
                    // The environment is healthy on its previous artifact;
                    // this promotion attempt still failed.
                    finish_run(&mut run, RunStatus::Failed);
                    self.runs.update_run(&run).await?;
                    return Ok(RunProgress::Completed(run));
                }
            }
        }

        finish_run(&mut run, RunStatus::Succeeded);
        self.runs.update_run(&run).await?;
        tracing::info!(run_id = %run.id, "pipeline run succeeded");
        Ok(RunProgress::Completed(run))
    }

    /// Approved-resume variant: re-checks eligibility with fresh time and
    /// scan state, settles the pending record with the human decision,
    /// then deploys
    async fn promote_through_environments_approved(
        &self,
        mut run: PipelineRun,
        artifact: Artifact,
        pending: PromotionRecord,
        approval: ApprovalRequest,
    ) -> Result<RunProgress, EngineError> {
        let environments = run.target_environments.clone();
        let index = environments
            .iter()
            .position(|e| *e == pending.to_env)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "run {} no longer targets environment '{}'",
                    run.id, pending.to_env
                ))
            })?;
        let to_env = self.fetch_environment(&environments[index]).await?;
        let from_env = match index {
            0 => None,
            _ => Some(self.fetch_environment(&environments[index - 1]).await?),
        };

        let scan = self.runs.latest_scan(&artifact.tag).await?;
        let now = chrono::Utc::now();
        let mut record = self.gate.check_eligibility(&EligibilityInput {
            run_id: run.id,
            artifact: &artifact,
            from_env: from_env.as_ref(),
            to_env: &to_env,
            scan: scan.as_ref(),
            now,
        });
        // Settle the suspension-time record rather than minting a second
        // one, so approval.promotion_id stays resolvable.
        record.id = pending.id;
        record.requested_at = pending.requested_at;
        record.approver = approval.approver.clone();
        record.decided_at = approval.decided_at;
        self.runs.insert_promotion(&record).await?;

        if record.decision != PromotionDecision::Allowed {
            finish_run(&mut run, RunStatus::Failed);
            self.runs.update_run(&run).await?;
            return Ok(RunProgress::Completed(run));
        }

        let mut artifact = artifact;
        match self.deploy_and_verify(&run, &mut artifact, &to_env.name).await {
            Ok(()) => self.promote_through_environments(run, artifact, index + 1).await,
            Err(DeployError::Cancelled) => {
                finish_run(&mut run, RunStatus::Cancelled);
                self.runs.update_run(&run).await?;
                Ok(RunProgress::Completed(run))
            }
            Err(DeployError::RolledBack) => {
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                Ok(RunProgress::Completed(run))
            }
            Err(DeployError::Failed(err)) => {
                finish_run(&mut run, RunStatus::Failed);
                self.runs.update_run(&run).await?;
                Err(err)
            }
        }
    }

    /// One deploy+verify pair against an environment, under its lock
    async fn deploy_and_verify(
        &self,
        run: &PipelineRun,
        artifact: &mut Artifact,
        environment: &str,
    ) -> Result<(), DeployError> {
        let request = DeployRequest {
            run_id: run.id,
            environment: environment.to_string(),
            commit_sha: run.commit_sha.clone(),
            enqueued_at: chrono::Utc::now(),
        };
        let _permit = match self.scheduler.admit(request).await {
            Ok(permit) => permit,
            Err(AdmissionError::Cancelled) => return Err(DeployError::Cancelled),
            Err(AdmissionError::Expired) => {
                return Err(DeployError::Failed(EngineError::TerminalInfrastructure(
                    format!("queued deployment to '{environment}' expired"),
                )));
            }
        };

        // Short-lived credential scoped to this environment
        let _token = self
            .tokens
            .exchange(&run.repository, environment)
            .await
            .map_err(DeployError::Failed)?;

        // Fresh state under the lock for the version CAS
        let mut env = self
            .fetch_environment(environment)
            .await
            .map_err(DeployError::Failed)?;

        let deploy_spec = self.stage_spec(
            run,
            StageKind::Deploy,
            Some(environment),
            Some(&artifact.tag),
        );
        let deploy = self
            .drive_stage(run, &deploy_spec)
            .await
            .map_err(DeployError::Failed)?;
        if let StageResolution::HardFailure {
            classification,
            detail,
            ..
        } = deploy
        {
            let err = match classification {
                FailureClass::Transient => EngineError::TransientInfrastructure(detail),
                _ => EngineError::TerminalInfrastructure(detail),
            };
            return Err(DeployError::Failed(err));
        }

        let verify_spec = self.stage_spec(
            run,
            StageKind::Verify,
            Some(environment),
            Some(&artifact.tag),
        );
        let verify = self
            .drive_stage(run, &verify_spec)
            .await
            .map_err(DeployError::Failed)?;

        match verify {
            StageResolution::Success { .. } => {
                let expected = env.version;
                env.record_deployment(
                    DeploymentRecord {
                        artifact_tag: artifact.tag.clone(),
                        digest: artifact.digest.clone(),
                        run_id: run.id,
                        deployed_at: chrono::Utc::now(),
                        verified: true,
                    },
                    self.config.history_limit,
                );
                self.environments
                    .compare_and_update(&env, expected)
                    .await
                    .map_err(DeployError::Failed)?;

                artifact.state = ArtifactState::Deployed;
                artifact.deployed_to.push(environment.to_string());
                self.runs
                    .insert_artifact(run.id, artifact)
                    .await
                    .map_err(DeployError::Failed)?;
                Ok(())
            }
            StageResolution::NeedsRollback { detail, .. } => {
                tracing::warn!(
                    run_id = %run.id,
                    environment,
                    "verification failed, rolling back: {detail}"
                );
                self.rollback_after_failed_verify(run, &mut env)
                    .await
                    .map_err(DeployError::Failed)?;
                Err(DeployError::RolledBack)
            }
            StageResolution::HardFailure { detail, .. } => Err(DeployError::Failed(
                EngineError::VerificationFailure {
                    environment: environment.to_string(),
                    message: detail,
                },
            )),
        }
    }

    /// Redeploys the environment's current (pre-deploy) artifact and
    /// re-verifies it; any failure here is terminal
    async fn rollback_after_failed_verify(
        &self,
        run: &PipelineRun,
        env: &mut Environment,
    ) -> Result<(), EngineError> {
        // The pointer was never moved, so it still names the last good
        // artifact.
        let target = env.deployed.clone().ok_or_else(|| EngineError::RollbackFailure {
            environment: env.name.clone(),
            message: "no previously deployed artifact, escalation required".to_string(),
        })?;

        let previous = DeploymentRecord {
            artifact_tag: target.tag,
            digest: target.digest,
            run_id: run.id,
            deployed_at: target.deployed_at,
            verified: target.verified,
        };
        self.redeploy_previous(env, &previous).await?;

        // Mark the failed verify stage as rolled back
        let stages = self.runs.fetch_stages(run.id).await?;
        if let Some(mut stage) = stages
            .into_iter()
            .filter(|s| {
                s.kind == StageKind::Verify
                    && s.environment.as_deref() == Some(env.name.as_str())
            })
            .next_back()
        {
            stage.status = StageStatus::RolledBack;
            self.runs.upsert_stage(&stage).await?;
        }

        tracing::info!(environment = %env.name, "rollback verified, environment healthy");
        Ok(())
    }

    /// Drives the rollback deploy+verify through the same executor path
    async fn redeploy_previous(
        &self,
        env: &mut Environment,
        previous: &DeploymentRecord,
    ) -> Result<(), EngineError> {
        let rollback_spec = StageSpec {
            run_id: previous.run_id,
            kind: StageKind::Deploy,
            environment: Some(env.name.clone()),
            repository: String::new(),
            commit_sha: previous.artifact_tag.clone(),
            artifact_tag: Some(previous.artifact_tag.clone()),
        };
        let timeout = self.config.timeouts.for_kind(StageKind::Deploy);
        let deploy = self.retry.run_stage(&self.executor, &rollback_spec, timeout).await;
        if !deploy.is_success() {
            return Err(EngineError::RollbackFailure {
                environment: env.name.clone(),
                message: "rollback redeploy failed, escalation required".to_string(),
            });
        }

        let verify_spec = StageSpec {
            kind: StageKind::Verify,
            ..rollback_spec
        };
        let timeout = self.config.timeouts.for_kind(StageKind::Verify);
        let verify = self.retry.run_stage(&self.executor, &verify_spec, timeout).await;
        if !verify.is_success() {
            return Err(EngineError::RollbackFailure {
                environment: env.name.clone(),
                message: "rollback verification failed, escalation required".to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Runs one stage through the retry controller, recording the stage
    /// and its attempts
    async fn drive_stage(
        &self,
        run: &PipelineRun,
        spec: &StageSpec,
    ) -> Result<StageResolution, EngineError> {
        let mut stage = Stage::new(run.id, spec.kind, spec.environment.clone());
        stage.status = StageStatus::Running;
        stage.started_at = Some(chrono::Utc::now());
        self.runs.upsert_stage(&stage).await?;

        let timeout = self.config.timeouts.for_kind(spec.kind);
        let resolution = self.retry.run_stage(&self.executor, spec, timeout).await;

        stage.attempts = resolution.attempts().to_vec();
        stage.status = resolution_status(&resolution);
        stage.ended_at = Some(chrono::Utc::now());
        if let StageResolution::HardFailure { classification, .. } = &resolution {
            stage.classification = Some(*classification);
        }
        if let StageResolution::NeedsRollback { .. } = &resolution {
            stage.classification = Some(FailureClass::Verification);
        }
        self.runs.upsert_stage(&stage).await?;

        Ok(resolution)
    }

    /// Settles the pending promotion record behind a rejected or expired
    /// approval
    async fn record_approval_outcome(
        &self,
        approval: &ApprovalRequest,
        reason: BlockReason,
    ) -> Result<(), EngineError> {
        let mut record = self.fetch_pending_promotion(approval).await?;
        record.decision = PromotionDecision::Rejected;
        record.block_reason = Some(reason);
        record.approver = approval.approver.clone();
        record.decided_at = approval.decided_at;
        self.runs.insert_promotion(&record).await
    }

    async fn fetch_pending_promotion(
        &self,
        approval: &ApprovalRequest,
    ) -> Result<PromotionRecord, EngineError> {
        self.runs
            .fetch_promotion(approval.promotion_id)
            .await?
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "approval {} references unknown promotion {}",
                    approval.id, approval.promotion_id
                ))
            })
    }

    async fn fetch_environment(&self, name: &str) -> Result<Environment, EngineError> {
        self.environments.fetch(name).await?.ok_or_else(|| {
            EngineError::TerminalInfrastructure(format!("unknown environment '{name}'"))
        })
    }

    fn stage_spec(
        &self,
        run: &PipelineRun,
        kind: StageKind,
        environment: Option<&str>,
        artifact_tag: Option<&str>,
    ) -> StageSpec {
        StageSpec {
            run_id: run.id,
            kind,
            environment: environment.map(|e| e.to_string()),
            repository: run.repository.clone(),
            commit_sha: run.commit_sha.clone(),
            artifact_tag: artifact_tag.map(|t| t.to_string()),
        }
    }
}

/// Internal deploy+verify outcome
enum DeployError {
    /// The queued request was superseded before starting
    Cancelled,
    /// Verify failed but the environment was restored
    RolledBack,
    Failed(EngineError),
}
