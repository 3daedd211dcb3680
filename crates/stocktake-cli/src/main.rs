//! Stocktake CLI - Command-line interface for asset audits
//!
//! Provides commands for:
//! - Recording a stock-take from a roster and a scan list
//! - Supervisor sign-off (first and final approval)
//! - Listing and inspecting audits
//! - Browsing the activity journal
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod input;
mod output;

use commands::{activity::ActivityCommand, audit::AuditCommand, config::ConfigCommand};
use context::AppContext;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "stocktake", version, about = "Asset stock-take audits with two-person sign-off")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create, approve and inspect audits
    #[command(subcommand)]
    Audit(AuditCommand),
    /// View the activity journal
    Activity(ActivityCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::from_json_flag(cli.json);
    let formatter = get_formatter(format);

    let ctx = match AppContext::load(cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            std::process::exit(2);
        }
    };

    // `config` commands report problems themselves
    if !matches!(cli.command, Commands::Config(_)) {
        if let Err(e) = ctx.ensure_valid() {
            formatter.error(&format!("{e:#}"));
            std::process::exit(2);
        }
    }

    // Setup tracing; RUST_LOG wins, then -v, then the config file
    let filter = match cli.verbose {
        0 => ctx.config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if format.is_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Audit(cmd) => cmd.execute(&ctx, format).await,
        Commands::Activity(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
    };

    if let Err(e) = result {
        formatter.error(&format!("{e:#}"));
        std::process::exit(1);
    }

    Ok(())
}
