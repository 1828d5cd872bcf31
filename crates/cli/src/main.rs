//! Taskboard CLI - projects and tasks from the terminal

mod commands;
mod config;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use taskboard_client::ClientError;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Manage taskboard projects and tasks")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Data directory for credentials, configuration and logs
    #[arg(short = 'd', long, global = true, env = "TASKBOARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to config.toml in the data directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Override the service origin
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::data_dir(cli.data_dir)?;
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log)?;

    info!("Starting taskboard CLI");

    let context = config::Context::load(data_dir, cli.config, cli.base_url)?;
    match cli.command.execute(context).await {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            if e
                .downcast_ref::<ClientError>()
                .is_some_and(ClientError::is_auth_expired)
            {
                eprintln!("Session expired, run `taskboard login` to sign in again");
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
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
