//! Approval command handlers
//!
//! Handles listing pending approval requests and applying decisions.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use cascade_client::OrchestratorClient;
use cascade_core::domain::promotion::ApprovalState;
use cascade_core::dto::promotion::{ApprovalDecision, ApprovalStatus};

use crate::config::Config;

/// Approval subcommands
#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List approval requests awaiting a decision
    List,
    /// Get the status of an approval request
    Get {
        /// Approval request ID
        id: Uuid,
    },
    /// Approve a pending promotion
    Approve {
        /// Approval request ID
        id: Uuid,

        /// Identity recorded as the approver
        #[arg(short, long, env = "CASCADE_APPROVER")]
        approver: String,
    },
    /// Reject a pending promotion
    Reject {
        /// Approval request ID
        id: Uuid,

        /// Identity recorded as the approver
        #[arg(short, long, env = "CASCADE_APPROVER")]
        approver: String,
    },
}

/// Handle approval commands
pub async fn handle_approval_command(command: ApprovalCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        ApprovalCommands::List => list_pending(&client).await,
        ApprovalCommands::Get { id } => get_approval(&client, id).await,
        ApprovalCommands::Approve { id, approver } => decide(&client, id, approver, true).await,
        ApprovalCommands::Reject { id, approver } => decide(&client, id, approver, false).await,
    }
}

/// List pending approval requests
async fn list_pending(client: &OrchestratorClient) -> Result<()> {
    let pending = client.list_pending_approvals().await?;

    if pending.is_empty() {
        println!("{}", "No pending approvals.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pending approval(s):", pending.len()).bold()
        );
        println!();
        for status in pending {
            print_approval(&status);
        }
    }

    Ok(())
}

/// Get a single approval request
async fn get_approval(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let status = client.get_approval(id).await?;
    print_approval(&status);
    Ok(())
}

/// Apply a decision to a pending approval request
async fn decide(client: &OrchestratorClient, id: Uuid, approver: String, approve: bool) -> Result<()> {
    let status = client
        .decide_approval(id, ApprovalDecision { approve, approver })
        .await?;

    if approve {
        println!(
            "{}",
            format!("✓ Approval {} granted, promotion resuming", id)
                .green()
                .bold()
        );
    } else {
        println!("{}", format!("✗ Approval {} rejected", id).red().bold());
    }
    print_approval(&status);

    Ok(())
}

fn print_approval(status: &ApprovalStatus) {
    println!(
        "  {} {} (run {})",
        colored_state(status.state),
        status.request_id.to_string().cyan(),
        status.run_id.to_string().dimmed()
    );

    if let Some(promotion) = &status.promotion {
        println!(
            "    Promotion: {} -> {} ({})",
            promotion.from_env,
            promotion.to_env.bold(),
            promotion.artifact_tag.dimmed()
        );
    }

    println!("    Expires:   {}", status.expires_at.to_rfc3339().dimmed());
}

fn colored_state(state: ApprovalState) -> ColoredString {
    match state {
        ApprovalState::Requested => "pending".yellow(),
        ApprovalState::Approved => "approved".green(),
        ApprovalState::Rejected => "rejected".red(),
        ApprovalState::Expired => "expired".dimmed(),
    }
}
