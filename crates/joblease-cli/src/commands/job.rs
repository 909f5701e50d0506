//! Job submission and inspection commands.

use std::str::FromStr;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use joblease_core::error::AppError;
use joblease_core::types::JobId;
use joblease_database::JobFilter;
use joblease_entity::job::{Job, JobStatus};
use joblease_worker::JobCreateParams;

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Submit a new job
    Enqueue {
        /// Job type, used to pick a handler
        job_type: String,
        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,
        /// Lower values are claimed first
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        priority: i32,
        /// Tenant the job belongs to
        #[arg(short, long)]
        tenant: Option<String>,
        /// Delivery attempts before the job is failed
        #[arg(long)]
        max_attempts: Option<i32>,
    },
    /// List jobs, newest first
    List {
        /// Filter by status (queued, claimed, running, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by tenant
        #[arg(short, long)]
        tenant: Option<String>,
        /// Maximum rows
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Show who holds a job's lease
    Status {
        /// Job id
        job_id: String,
    },
}

/// Job display row for table output
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Job ID
    id: String,
    /// Job type
    job_type: String,
    /// Tenant
    tenant: String,
    /// Status
    status: String,
    /// Priority
    priority: i32,
    /// Lease holder
    claimed_by: String,
    /// Lease deadline
    lock_expires_at: String,
    /// Attempts used
    attempts: String,
    /// Created at
    created_at: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            job_type: job.job_type.clone(),
            tenant: job.tenant_scope.clone().unwrap_or_else(|| "-".to_string()),
            status: job.status.to_string(),
            priority: job.priority,
            claimed_by: job
                .claimed_by
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            lock_expires_at: job.lock_expires_at.map_or_else(
                || "-".to_string(),
                |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            attempts: format!("{}/{}", job.attempts, job.max_attempts),
            created_at: job.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute job commands
pub async fn execute(
    args: &JobArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = super::open_context(config_path).await?;

    match &args.command {
        JobCommand::Enqueue {
            job_type,
            payload,
            priority,
            tenant,
            max_attempts,
        } => {
            let payload: serde_json::Value = serde_json::from_str(payload)
                .map_err(|e| AppError::validation(format!("Invalid JSON payload: {}", e)))?;

            let job = ctx
                .queue
                .enqueue(JobCreateParams {
                    job_type: job_type.clone(),
                    tenant_scope: tenant.clone(),
                    priority: *priority,
                    payload,
                    max_attempts: *max_attempts,
                })
                .await?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Job '{}' enqueued (id: {})", job_type, job.id))
                }
                OutputFormat::Json => output::print_item("Job", &job, format),
            }
        }
        JobCommand::List {
            status,
            tenant,
            limit,
        } => {
            let status = status
                .as_deref()
                .map(JobStatus::from_str)
                .transpose()
                .map_err(AppError::validation)?;

            let jobs = ctx
                .queue
                .list(&JobFilter {
                    status,
                    tenant_scope: tenant.clone(),
                    limit: *limit,
                })
                .await?;

            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
        }
        JobCommand::Status { job_id } => {
            let id = JobId::from_str(job_id)
                .map_err(|e| AppError::validation(format!("Invalid job id '{}': {}", job_id, e)))?;
            let status = ctx.leases.get_lock_status(id).await?;
            if status.status.is_none() {
                output::print_warning(&format!("No job with id {}", id));
            }
            output::print_item("Lock status", &status, format);
        }
    }

    Ok(())
}
