//! Cascade CLI
//!
//! Command-line interface for interacting with the Cascade orchestrator.
//! Failures classified by the engine exit with their taxonomy code;
//! everything else exits with 1.

mod commands;
mod config;

use clap::Parser;
use colored::*;

use cascade_client::error::ClientError;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "cascade")]
#[command(about = "Cascade CI/CD Pipeline CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "CASCADE_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    if let Err(err) = handle_command(cli.command, &config).await {
        eprintln!("{} {}", "✗".red().bold(), err);

        let code = err
            .downcast_ref::<ClientError>()
            .and_then(|e| e.taxonomy_code())
            .unwrap_or(1);
        std::process::exit(code);
    }
}
