//! Job record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use joblease_core::types::{JobId, WorkerId};

use super::status::JobStatus;

/// A job record: the only shared mutable row in the lease subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Tenant or site the job belongs to. Only used to filter claims.
    pub tenant_scope: Option<String>,
    /// Job type identifier used to pick a handler.
    pub job_type: String,
    /// Job-specific payload (JSON). Opaque to the lease core.
    pub payload: serde_json::Value,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Lower values are claimed first.
    pub priority: i32,
    /// Current lease holder.
    pub claimed_by: Option<WorkerId>,
    /// When the current lease began.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Lease deadline.
    pub lock_expires_at: Option<DateTime<Utc>>,
    /// Incremented on every successful claim; never reused.
    pub lock_version: i64,
    /// Lease losses so far (crashes, missed heartbeats).
    pub attempts: i32,
    /// Ceiling on `attempts` before the job is failed permanently.
    pub max_attempts: i32,
    /// When the job started executing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Result data on completion (JSON).
    pub result: Option<serde_json::Value>,
    /// Error message on failure.
    pub error_message: Option<String>,
    /// When the job was submitted. Tie-breaker for claim order.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a freshly queued record.
    pub fn from_new(data: &NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            tenant_scope: data.tenant_scope.clone(),
            job_type: data.job_type.clone(),
            payload: data.payload.clone(),
            status: JobStatus::Queued,
            priority: data.priority,
            claimed_by: None,
            claimed_at: None,
            lock_expires_at: None,
            lock_version: 0,
            attempts: 0,
            max_attempts: data.max_attempts,
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the job holds a lease that has not yet expired.
    pub fn has_active_lease(&self, now: DateTime<Utc>) -> bool {
        self.status.is_leased()
            && self.claimed_by.is_some()
            && self.lock_expires_at.is_some_and(|expires| expires > now)
    }

    /// Whether the job is leased but its deadline has passed.
    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_leased() && self.lock_expires_at.is_some_and(|expires| expires < now)
    }

    /// Whether a claim may take this job at `now`.
    ///
    /// Queued jobs are always claimable. An expired lease is claimable only
    /// while taking it over leaves at least one delivery attempt; otherwise
    /// it waits for the recovery sweep to fail it.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Queued => true,
            JobStatus::Claimed | JobStatus::Running => {
                self.is_lease_expired(now) && self.attempts + 1 < self.max_attempts
            }
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }

    /// Whether `worker` is the recorded lease holder.
    pub fn is_owned_by(&self, worker: &WorkerId) -> bool {
        self.claimed_by.as_ref() == Some(worker)
    }

    /// Whether delivery attempts are used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Claim ordering key: priority, then age, then id for a stable total order.
    pub fn claim_order(&self) -> (i32, DateTime<Utc>, JobId) {
        (self.priority, self.created_at, self.id)
    }
}

/// Data required to submit a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Job type identifier.
    pub job_type: String,
    /// Optional tenant scope.
    pub tenant_scope: Option<String>,
    /// Lower values are claimed first.
    pub priority: i32,
    /// Job-specific payload.
    pub payload: serde_json::Value,
    /// Delivery attempts before permanent failure.
    pub max_attempts: i32,
}

impl NewJob {
    /// A job of `job_type` with default priority 0 and the given delivery budget.
    pub fn new(job_type: impl Into<String>, max_attempts: i32) -> Self {
        Self {
            job_type: job_type.into(),
            tenant_scope: None,
            priority: 0,
            payload: serde_json::Value::Null,
            max_attempts,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the tenant scope.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_scope = Some(tenant.into());
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
