//! Signalement CLI - administration client for the incident-reporting platform

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use signalement_core::config::StorageSettings;
use signalement_http::ApiError;
use std::fmt::Write;
use std::path::PathBuf;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "signalement")]
#[command(about = "Administration client for the signalement platform")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Directory holding the stored session, preferences and logs
    #[arg(short = 'd', long, global = true, env = "SIGNALEMENT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (TOML or YAML)
    #[arg(long, global = true, env = "SIGNALEMENT_CONFIG")]
    config: Option<PathBuf>,

    /// API base URL, overrides the configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = StorageSettings {
        data_dir: cli.data_dir.clone(),
    }
    .resolved_data_dir();
    logging::init_logging(cli.log_level.into(), &log_dir, cli.no_file_log)?;

    if let Err(e) = run(cli).await {
        error!("Command failed: {e:#}");
        eprintln!("{}", render_error(&e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::load_settings(cli.config.as_deref(), cli.data_dir, cli.base_url)?;
    debug!(base_url = %settings.base_url(), "Using API");

    let client = config::build_client(&settings)?;
    cli.command.execute(client, cli.json).await
}

/// Normalized message, error tag and field details of a failed command
fn render_error(err: &anyhow::Error) -> String {
    let Some(api) = err.chain().find_map(|cause| cause.downcast_ref::<ApiError>()) else {
        return format!("Erreur: {err:#}");
    };

    let mut out = format!("Erreur: {} [{}]", api.user_message(), api.error_type);
    if api.status != 0 {
        let _ = write!(out, " (HTTP {})", api.status);
    }
    for (field, message) in api.details.iter().flatten() {
        let _ = write!(out, "\n  {field}: {message}");
    }
    if let Some(action) = api.user_action() {
        let _ = write!(out, "\n{action}");
    }
    out
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
