//! Job submission and queue statistics.
//!
//! Submission sits outside the lease core: it only ever inserts Queued
//! rows and never touches lease fields.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing;

use joblease_core::clock::Clock;
use joblease_core::error::AppError;
use joblease_core::result::AppResult;
use joblease_database::{JobFilter, JobStore};
use joblease_entity::job::{Job, JobStatus, NewJob};

/// Parameters for creating a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreateParams {
    /// Type of job, used to pick a handler
    pub job_type: String,
    /// Tenant the job belongs to
    pub tenant_scope: Option<String>,
    /// Lower values are claimed first
    pub priority: i32,
    /// Job payload as JSON
    pub payload: serde_json::Value,
    /// Delivery attempts; falls back to the queue default when unset
    pub max_attempts: Option<i32>,
}

impl JobCreateParams {
    /// Params for `job_type` with default priority and an empty payload
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            tenant_scope: None,
            priority: 0,
            payload: serde_json::Value::Null,
            max_attempts: None,
        }
    }
}

/// Job queue for submitting work and reading queue state
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    default_max_attempts: i32,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, default_max_attempts: i32) -> Self {
        Self {
            store,
            clock,
            default_max_attempts,
        }
    }

    /// Enqueue a new job
    pub async fn enqueue(&self, params: JobCreateParams) -> AppResult<Job> {
        if params.job_type.trim().is_empty() {
            return Err(AppError::validation("Job type must not be empty"));
        }
        let max_attempts = params.max_attempts.unwrap_or(self.default_max_attempts);
        if max_attempts < 1 {
            return Err(AppError::validation(format!(
                "max_attempts must be at least 1, got {max_attempts}"
            )));
        }

        let data = NewJob {
            job_type: params.job_type,
            tenant_scope: params.tenant_scope,
            priority: params.priority,
            payload: params.payload,
            max_attempts,
        };
        let job = self.store.insert(&data, self.clock.now()).await?;

        tracing::debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            tenant_scope = ?job.tenant_scope,
            priority = job.priority,
            "Enqueued job"
        );

        Ok(job)
    }

    /// List jobs newest first
    pub async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        self.store.list(filter).await
    }

    /// Delete completed/failed jobs last updated more than `retention_days` ago
    pub async fn cleanup_terminal(&self, retention_days: u32) -> AppResult<u64> {
        let before = Duration::try_days(i64::from(retention_days))
            .and_then(|retention| self.clock.now().checked_sub_signed(retention))
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Retention of {retention_days} days is out of range"
                ))
            })?;
        let removed = self.store.delete_terminal_before(before).await?;
        if removed > 0 {
            tracing::info!(removed, retention_days, "Deleted old terminal jobs");
        }
        Ok(removed)
    }

    /// Get queue statistics
    pub async fn stats(&self) -> AppResult<QueueStats> {
        Ok(QueueStats {
            queued: self.store.count_by_status(JobStatus::Queued).await?,
            claimed: self.store.count_by_status(JobStatus::Claimed).await?,
            running: self.store.count_by_status(JobStatus::Running).await?,
            completed: self.store.count_by_status(JobStatus::Completed).await?,
            failed: self.store.count_by_status(JobStatus::Failed).await?,
        })
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs waiting to be claimed
    pub queued: i64,
    /// Jobs leased but not yet started
    pub claimed: i64,
    /// Jobs executing
    pub running: i64,
    /// Jobs finished successfully
    pub completed: i64,
    /// Jobs failed or exhausted
    pub failed: i64,
}
