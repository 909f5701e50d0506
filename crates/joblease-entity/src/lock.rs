//! Read-only projection of a job's lease state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use joblease_core::types::WorkerId;

use crate::job::{Job, JobStatus};

/// Current ownership of a job, for dashboards and alerting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    /// Whether an unexpired lease is held.
    pub locked: bool,
    /// Recorded lease holder.
    pub owner_id: Option<WorkerId>,
    /// Lease deadline.
    pub expires_at: Option<DateTime<Utc>>,
    /// Job status; `None` when the job does not exist.
    pub status: Option<JobStatus>,
}

impl LockStatus {
    /// Projection for a job id with no record.
    pub fn missing() -> Self {
        Self {
            locked: false,
            owner_id: None,
            expires_at: None,
            status: None,
        }
    }

    /// Project `job` as seen at `now`.
    pub fn of(job: &Job, now: DateTime<Utc>) -> Self {
        Self {
            locked: job.has_active_lease(now),
            owner_id: job.claimed_by.clone(),
            expires_at: job.lock_expires_at,
            status: Some(job.status),
        }
    }
}
