//! batchgate CLI - Run batches of remote calls from the command line
//!
//! Provides commands for:
//! - Running a JSONL batch against an HTTP endpoint
//! - Inspecting and validating configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use batchgate_core::config::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod shutdown;

use commands::{config::ConfigCommand, run::RunCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "batchgate",
    version,
    about = "Adaptive batch runner for rate-limited remote services"
)]
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
    /// Run a batch of work descriptors
    Run(RunCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Configuration plus the file it came from
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// Loads the configuration file and applies environment overrides.
///
/// An explicitly requested file must exist; the default location falls
/// back to built-in defaults.
fn load_config(explicit: Option<PathBuf>) -> Result<LoadedConfig> {
    let (mut config, path) = match explicit {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            (config, path)
        }
        None => {
            let path = Config::default_path();
            (Config::load_or_default(&path), path)
        }
    };
    config.apply_env_overrides();
    Ok(LoadedConfig { config, path })
}

fn log_filter(verbose: u8, configured: &str) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config)?;

    // Logs go to stderr so JSON output on stdout stays parseable
    let filter = log_filter(cli.verbose, &loaded.config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Run(cmd) => cmd.execute(loaded, format).await,
        Commands::Config(cmd) => cmd.execute(&loaded, format),
    }
}
