//! Run command handlers
//!
//! Handles triggering runs, inspecting their stage graph, and
//! submitting scan reports for their artifacts.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use cascade_client::OrchestratorClient;
use cascade_core::domain::run::{RunStatus, TriggerKind};
use cascade_core::domain::stage::{Stage, StageStatus};
use cascade_core::domain::workflow::WorkflowDefinition;
use cascade_core::dto::promotion::PromoteRequest;
use cascade_core::dto::run::{RunSummary, SubmitScanReport, TriggerRun};

use crate::config::Config;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Trigger a new pipeline run
    Trigger {
        /// Repository in org/name form
        #[arg(short, long)]
        repository: String,

        /// Branch the commit is on
        #[arg(short, long)]
        branch: String,

        /// Commit SHA (full 40-hex, or a 7-12 hex short form)
        #[arg(short, long)]
        commit: String,

        /// Path to the workflow definition JSON file
        #[arg(short, long)]
        workflow: String,

        /// Trigger kind: push, pull_request, manual, schedule
        #[arg(long, default_value = "manual")]
        kind: String,
    },
    /// List recent runs
    List,
    /// Get run details with its stages
    Get {
        /// Run ID
        id: Uuid,
    },
    /// Promote a run's artifact into a target environment
    Promote {
        /// Run ID
        id: Uuid,

        /// Target environment name
        #[arg(short, long)]
        to_env: String,
    },
}

/// Scan subcommands
#[derive(Subcommand)]
pub enum ScanCommands {
    /// Submit a scan report for an artifact tag
    Submit {
        /// Artifact tag (the commit SHA)
        tag: String,

        /// Number of critical-severity findings
        #[arg(long, default_value = "0")]
        critical: u32,

        /// Total number of findings
        #[arg(long, default_value = "0")]
        total: u32,
    },
}

fn parse_trigger_kind(s: &str) -> Result<TriggerKind> {
    match s {
        "push" => Ok(TriggerKind::Push),
        "pull_request" => Ok(TriggerKind::PullRequest),
        "manual" => Ok(TriggerKind::Manual),
        "schedule" => Ok(TriggerKind::Schedule),
        other => anyhow::bail!("unknown trigger kind '{}'", other),
    }
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        RunCommands::Trigger {
            repository,
            branch,
            commit,
            workflow,
            kind,
        } => trigger_run(&client, repository, branch, commit, &workflow, &kind).await,
        RunCommands::List => list_runs(&client).await,
        RunCommands::Get { id } => get_run(&client, id).await,
        RunCommands::Promote { id, to_env } => promote_run(&client, id, to_env).await,
    }
}

/// Handle scan commands
pub async fn handle_scan_command(command: ScanCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        ScanCommands::Submit {
            tag,
            critical,
            total,
        } => {
            client
                .submit_scan_report(SubmitScanReport {
                    artifact_tag: tag.clone(),
                    critical_findings: critical,
                    total_findings: total,
                })
                .await?;

            println!(
                "{}",
                format!("✓ Scan report recorded for {}", tag).green().bold()
            );
            Ok(())
        }
    }
}

/// Trigger a new pipeline run
async fn trigger_run(
    client: &OrchestratorClient,
    repository: String,
    branch: String,
    commit: String,
    workflow_path: &str,
    kind: &str,
) -> Result<()> {
    let workflow_content = std::fs::read_to_string(workflow_path)
        .with_context(|| format!("Failed to read workflow file: {}", workflow_path))?;

    let workflow: WorkflowDefinition = serde_json::from_str(&workflow_content)
        .context("Failed to parse workflow definition")?;

    let req = TriggerRun {
        repository,
        branch,
        commit_sha: commit,
        trigger: parse_trigger_kind(kind)?,
        workflow,
    };

    let run = client.trigger_run(req).await?;

    println!("{}", "✓ Run triggered!".green().bold());
    println!("  ID:       {}", run.id.to_string().cyan());
    println!("  Branch:   {}", run.branch.bold());
    println!(
        "  Targets:  {}",
        if run.target_environments.is_empty() {
            "none (build and test only)".dimmed().to_string()
        } else {
            run.target_environments.join(" -> ").dimmed().to_string()
        }
    );

    Ok(())
}

/// Manually promote a run's artifact
async fn promote_run(client: &OrchestratorClient, id: Uuid, to_env: String) -> Result<()> {
    let run = client
        .promote_run(id, PromoteRequest { to_env: to_env.clone() })
        .await?;

    match run.status {
        RunStatus::Succeeded => println!(
            "{}",
            format!("✓ Promoted to {}", to_env).green().bold()
        ),
        RunStatus::Running => println!(
            "{}",
            format!("… Promotion to {} suspended pending approval", to_env).yellow()
        ),
        _ => println!(
            "{}",
            format!("✗ Promotion to {} did not complete", to_env).red()
        ),
    }
    print_run_summary(&run);

    Ok(())
}

/// List recent runs
async fn list_runs(client: &OrchestratorClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

/// Get and display a single run
async fn get_run(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let detail = client.get_run(id).await?;

    print_run_summary(&RunSummary::from(&detail.run));
    println!();
    println!("  {}", "Stages:".bold());
    for stage in &detail.stages {
        print_stage(stage);
    }

    if let Some(failure) = &detail.failure {
        println!();
        println!(
            "  {} {} stage failed{}",
            "✗".red().bold(),
            failure.stage.to_string().bold(),
            failure
                .environment
                .as_ref()
                .map(|e| format!(" in {}", e))
                .unwrap_or_default()
        );
        if let Some(class) = failure.classification {
            println!("    Class:  {:?}", class);
        }
        println!("    Commit: {}", failure.commit_sha.dimmed());
        if let Some(tag) = &failure.artifact_tag {
            println!("    Tag:    {}", tag.dimmed());
        }
        println!("    Detail: {}", failure.detail);
    }

    Ok(())
}

fn print_run_summary(run: &RunSummary) {
    println!(
        "  {} {} {}@{} ({})",
        colored_run_status(run.status),
        run.id.to_string().cyan(),
        run.repository.bold(),
        run.branch,
        &run.commit_sha[..12.min(run.commit_sha.len())].dimmed()
    );
}

fn print_stage(stage: &Stage) {
    let environment = stage
        .environment
        .as_ref()
        .map(|e| format!(" [{}]", e))
        .unwrap_or_default();
    let attempts = if stage.attempts.len() > 1 {
        format!(" ({} attempts)", stage.attempts.len())
    } else {
        String::new()
    };

    println!(
        "    {} {}{}{}",
        colored_stage_status(stage.status),
        stage.kind,
        environment.dimmed(),
        attempts.dimmed()
    );
}

fn colored_run_status(status: RunStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        RunStatus::Succeeded => text.green(),
        RunStatus::Failed => text.red(),
        RunStatus::Cancelled => text.dimmed(),
        RunStatus::Running | RunStatus::Pending => text.yellow(),
    }
}

fn colored_stage_status(status: StageStatus) -> ColoredString {
    match status {
        StageStatus::Success => "✓".green(),
        StageStatus::Failed | StageStatus::TimedOut => "✗".red(),
        StageStatus::RolledBack => "↩".red(),
        StageStatus::Skipped => "-".dimmed(),
        StageStatus::Running | StageStatus::Pending => "…".yellow(),
    }
}
