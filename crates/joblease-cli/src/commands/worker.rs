//! Worker status commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::output::{self, OutputFormat};
use joblease_core::error::AppError;
use joblease_worker::QueueStats;

/// Arguments for worker commands
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Show queue counts and the configured worker settings
    Status,
}

#[derive(Debug, Serialize)]
struct WorkerStatus {
    #[serde(flatten)]
    queue: QueueStats,
    worker_enabled: bool,
    concurrency: usize,
    tenant_scope: Option<String>,
    lease_duration_seconds: u64,
    heartbeat_interval_seconds: u64,
}

/// Execute worker commands
pub async fn execute(
    args: &WorkerArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = super::open_context(config_path).await?;

    match &args.command {
        WorkerCommand::Status => {
            let status = WorkerStatus {
                queue: ctx.queue.stats().await?,
                worker_enabled: ctx.config.worker.enabled,
                concurrency: ctx.config.worker.concurrency,
                tenant_scope: ctx.config.worker.tenant_scope.clone(),
                lease_duration_seconds: ctx.config.lease.lease_duration_seconds,
                heartbeat_interval_seconds: ctx.config.lease.heartbeat_interval_seconds,
            };
            output::print_item("Worker Queue Status", &status, format);
        }
    }

    Ok(())
}
