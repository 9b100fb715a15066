//! VitalSync CLI - Command-line interface for VitalSync
//!
//! Provides commands for:
//! - Importing samples into the local store
//! - Running an incremental sync against the aggregation server
//! - Comparing local and server state
//! - Viewing and editing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vitalsync_core::config::Config;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, import::ImportCommand,
    status::StatusCommand, sync::SyncCommand, CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "vitalsync",
    version,
    about = "Incremental time-series sync for on-device health data"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload pending samples to the server
    Sync(SyncCommand),
    /// Load samples from a JSON or NDJSON file into the local store
    Import(ImportCommand),
    /// Show local and server sync state per metric
    Status(StatusCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Filter used when `RUST_LOG` is unset: `-v` wins, then `-q`, then config
fn log_directive(verbose: u8, quiet: bool, configured: &str) -> String {
    match (verbose, quiet) {
        (0, true) => "warn".to_string(),
        (0, false) => configured.to_string(),
        (1, _) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(cli: &Cli, config: &Config) {
    let directive = log_directive(cli.verbose, cli.quiet, &config.logging.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // Logs go to stderr so `--json` output on stdout stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        // `config validate` reports parse errors itself
        Err(e) if config_path.exists() && !matches!(cli.command, Commands::Config(_)) => {
            return Err(e)
        }
        Err(_) => Config::default(),
    };

    init_tracing(&cli, &config);

    let ctx = CliContext {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
        config_path,
        config,
    };

    match &cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Import(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(),
    }
}
