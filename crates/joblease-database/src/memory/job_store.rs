//! In-memory job store using dashmap.
//!
//! Each conditional write holds the row's shard lock (`get_mut`) while it
//! checks the predicate and mutates, which gives the same row-level
//! compare-and-swap the PostgreSQL `UPDATE … WHERE` provides. No lock is
//! held across an `.await`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use joblease_core::error::AppError;
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_entity::job::{Job, JobOutcome, JobStatus, NewJob};

use crate::store::{JobFilter, JobStore};

/// Process-local job store.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, data: &NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        if data.max_attempts < 1 {
            return Err(AppError::database(format!(
                "Failed to create job: max_attempts {} violates jobs_max_attempts_positive",
                data.max_attempts
            )));
        }
        let job = Job::from_new(data, now);
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| filter.status.is_none_or(|s| entry.status == s))
            .filter(|entry| {
                filter
                    .tenant_scope
                    .as_ref()
                    .is_none_or(|t| entry.tenant_scope.as_ref() == Some(t))
            })
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(filter.limit.max(0) as usize);
        Ok(jobs)
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        Ok(self.jobs.iter().filter(|entry| entry.status == status).count() as i64)
    }

    async fn find_claim_candidate(
        &self,
        tenant_scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| entry.is_claimable(now))
            .filter(|entry| tenant_scope.is_none_or(|t| entry.tenant_scope.as_deref() == Some(t)))
            .min_by_key(|entry| entry.claim_order())
            .map(|entry| entry.value().clone()))
    }

    async fn try_claim(
        &self,
        id: JobId,
        expected_version: i64,
        worker: &WorkerId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let Some(mut job) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.lock_version != expected_version || !job.is_claimable(now) {
            debug!(%id, expected_version, actual = job.lock_version, %worker, "Claim predicate did not match");
            return Ok(None);
        }

        if job.status.is_leased() {
            job.attempts += 1;
        }
        job.status = JobStatus::Claimed;
        job.claimed_by = Some(worker.clone());
        job.claimed_at = Some(now);
        job.lock_expires_at = Some(expires_at);
        job.lock_version += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn extend_lease(
        &self,
        id: JobId,
        worker: &WorkerId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let Some(mut job) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !job.status.is_leased() || !job.is_owned_by(worker) {
            return Ok(None);
        }

        let extended = job.lock_expires_at.map_or(expires_at, |cur| cur.max(expires_at));
        job.lock_expires_at = Some(extended);
        job.updated_at = now;
        Ok(Some(extended))
    }

    async fn mark_running(
        &self,
        id: JobId,
        worker: &WorkerId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let Some(mut job) = self.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Claimed || !job.is_owned_by(worker) {
            return Ok(false);
        }

        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn release(
        &self,
        id: JobId,
        worker: &WorkerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let Some(mut job) = self.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.status.is_leased() || !job.is_owned_by(worker) {
            return Ok(false);
        }

        job.status = outcome.final_status();
        job.result = outcome.result().cloned();
        job.error_message = outcome.error_message().map(str::to_string);
        job.lock_expires_at = None;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn find_expired_leases(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>> {
        let mut expired: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.is_lease_expired(now))
            .map(|entry| entry.value().clone())
            .collect();
        expired.sort_by_key(|job| job.lock_expires_at);
        Ok(expired)
    }

    async fn recover_expired(
        &self,
        id: JobId,
        expected_version: i64,
        exhausted_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let Some(mut job) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.lock_version != expected_version || !job.is_lease_expired(now) {
            return Ok(None);
        }

        job.attempts += 1;
        if job.is_exhausted() {
            job.status = JobStatus::Failed;
            job.error_message = Some(exhausted_message.to_string());
            job.completed_at = Some(now);
        } else {
            job.status = JobStatus::Queued;
            job.completed_at = None;
        }
        job.claimed_by = None;
        job.claimed_at = None;
        job.lock_expires_at = None;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn delete_terminal_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let len_before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.status.is_terminal() && job.updated_at < before));
        Ok((len_before - self.jobs.len()) as u64)
    }
}
