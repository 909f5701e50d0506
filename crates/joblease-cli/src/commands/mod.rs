//! CLI command definitions and dispatch.

pub mod cleanup;
pub mod job;
pub mod migrate;
pub mod recover;
pub mod worker;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use joblease_core::clock::{Clock, SystemClock};
use joblease_core::config::{AppConfig, StoreBackend};
use joblease_core::error::AppError;
use joblease_database::JobStore;
use joblease_worker::{JobQueue, LeaseManager};

/// JobLease: lease-based job claiming over a shared job table
#[derive(Debug, Parser)]
#[command(name = "joblease", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Submit and inspect jobs
    Job(job::JobArgs),
    /// Worker and queue status
    Worker(worker::WorkerArgs),
    /// Run one lease recovery sweep now
    Recover,
    /// Delete old completed and failed jobs
    Cleanup(cleanup::CleanupArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &self.config).await,
            Commands::Job(args) => job::execute(args, &self.config, self.format).await,
            Commands::Worker(args) => worker::execute(args, &self.config, self.format).await,
            Commands::Recover => recover::execute(&self.config, self.format).await,
            Commands::Cleanup(args) => cleanup::execute(args, &self.config).await,
        }
    }
}

/// Handles shared by the commands that touch the job table
#[derive(Debug)]
pub struct Context {
    /// Loaded configuration
    pub config: AppConfig,
    /// Lease operations over the configured store
    pub leases: LeaseManager,
    /// Submission and statistics over the same store
    pub queue: JobQueue,
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e.message)))
}

/// Helper: load config and open the configured job store
pub async fn open_context(config_path: &str) -> Result<Context, AppError> {
    let config = load_config(config_path)?;
    require_shared_store(&config)?;

    let store: Arc<dyn JobStore> = joblease_database::open_store(&config.database).await?;
    tracing::debug!(backend = ?config.database.backend, "Opened job store");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let leases = LeaseManager::new(Arc::clone(&store), Arc::clone(&clock));
    let queue = JobQueue::new(store, clock, config.lease.default_max_attempts);

    Ok(Context {
        config,
        leases,
        queue,
    })
}

/// Reject a store only this CLI process could see
fn require_shared_store(config: &AppConfig) -> Result<(), AppError> {
    if config.database.backend == StoreBackend::Memory {
        return Err(AppError::configuration(
            "database.backend is \"memory\": the CLI would open its own empty store. \
             Point it at the postgres job table instead",
        ));
    }
    Ok(())
}
