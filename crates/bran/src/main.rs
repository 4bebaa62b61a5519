//! Bran - command-line harness for BDD test-runner MCP servers.
//!
//! Main entry point for the bran CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{run, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Bran - drive a BDD test-runner MCP server over stdio or HTTP
#[derive(Parser)]
#[command(name = "bran")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the BDD suite via the server's runner tool and print the report
    Run(run::RunArgs),

    /// List the tools the server exposes
    Tools(tools::ToolsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "bran=debug,bran_mcp=debug,info"
    } else {
        "bran=info,bran_mcp=info,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
                ),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
    }
}
