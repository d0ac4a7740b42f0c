//! Environment command handlers
//!
//! Handles listing environments and rolling one back to its previous
//! deployment.

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use cascade_client::OrchestratorClient;
use cascade_core::domain::environment::Environment;
use cascade_core::dto::promotion::RollbackRequest;

use crate::config::Config;

/// Environment subcommands
#[derive(Subcommand)]
pub enum EnvironmentCommands {
    /// List all environments with their deployed artifacts
    List,
    /// Roll an environment back to its previous deployment
    Rollback {
        /// Environment name
        name: String,
    },
}

/// Handle environment commands
pub async fn handle_environment_command(
    command: EnvironmentCommands,
    config: &Config,
) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        EnvironmentCommands::List => list_environments(&client).await,
        EnvironmentCommands::Rollback { name } => rollback(&client, name).await,
    }
}

/// List environments
async fn list_environments(client: &OrchestratorClient) -> Result<()> {
    let environments = client.list_environments().await?;

    if environments.is_empty() {
        println!("{}", "No environments configured.".yellow());
    } else {
        for environment in environments {
            print_environment(&environment);
        }
    }

    Ok(())
}

/// Roll an environment back
async fn rollback(client: &OrchestratorClient, name: String) -> Result<()> {
    client
        .rollback_environment(RollbackRequest {
            environment: name.clone(),
        })
        .await?;

    println!(
        "{}",
        format!("✓ Environment {} rolled back", name).green().bold()
    );

    Ok(())
}

fn print_environment(environment: &Environment) {
    let gate = if environment.policy.requires_approval() {
        "approval required".yellow()
    } else {
        "auto-deploy".green()
    };

    println!("  {} ({})", environment.name.bold(), gate);

    match &environment.deployed {
        Some(deployed) => {
            let verified = if deployed.verified {
                "verified".green()
            } else {
                "unverified".yellow()
            };
            println!(
                "    Deployed: {} {} ({})",
                deployed.tag.cyan(),
                deployed.digest.dimmed(),
                verified
            );
        }
        None => println!("    Deployed: {}", "nothing".dimmed()),
    }

    if !environment.history.is_empty() {
        println!(
            "    History:  {} deployment(s)",
            environment.history.len().to_string().dimmed()
        );
    }
}
