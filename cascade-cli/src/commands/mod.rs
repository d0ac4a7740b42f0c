//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod approval;
mod environment;
mod run;

pub use approval::ApprovalCommands;
pub use environment::EnvironmentCommands;
pub use run::{RunCommands, ScanCommands};

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline run management
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Promotion approval management
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
    /// Environment inspection and rollback
    Environment {
        #[command(subcommand)]
        command: EnvironmentCommands,
    },
    /// Scan report submission
    Scan {
        #[command(subcommand)]
        command: ScanCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Approval { command } => approval::handle_approval_command(command, config).await,
        Commands::Environment { command } => {
            environment::handle_environment_command(command, config).await
        }
        Commands::Scan { command } => run::handle_scan_command(command, config).await,
    }
}
