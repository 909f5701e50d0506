//! The job record store contract.
//!
//! Every mutating method is one atomic conditional write. A predicate
//! mismatch (lost race, lost ownership, job no longer eligible) is an
//! ordinary outcome reported as `None`/`false`; `Err` is reserved for the
//! store itself failing.
//!
//! Only the lease operations in `joblease-worker` call the mutating
//! methods, so `status`, `claimed_by`, `lock_expires_at`, and
//! `lock_version` have exactly one write path each.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use joblease_core::config::{DatabaseConfig, StoreBackend};
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_entity::job::{Job, JobOutcome, JobStatus, NewJob};

use crate::connection::DatabasePool;
use crate::memory::MemoryJobStore;
use crate::repositories::job::JobRepository;

/// Filter for operator listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Only jobs in this tenant.
    pub tenant_scope: Option<String>,
    /// Maximum rows returned.
    pub limit: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            tenant_scope: None,
            limit: 50,
        }
    }
}

/// Persisted job table with compare-and-swap style writes.
#[async_trait]
pub trait JobStore: Send + Sync + fmt::Debug + 'static {
    /// Insert a new Queued job.
    async fn insert(&self, data: &NewJob, now: DateTime<Utc>) -> AppResult<Job>;

    /// Find a job by id.
    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// List jobs newest first.
    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>>;

    /// Count jobs in `status`.
    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64>;

    /// Best claimable job at `now`: lowest priority, then oldest.
    ///
    /// This is a plain read; the returned row may be taken by another
    /// worker before [`JobStore::try_claim`] runs.
    async fn find_claim_candidate(
        &self,
        tenant_scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Lease `id` to `worker` if `lock_version` still equals
    /// `expected_version` and the job is still claimable at `now`.
    ///
    /// Bumps `lock_version`. Taking over an expired lease also counts one
    /// delivery attempt.
    async fn try_claim(
        &self,
        id: JobId,
        expected_version: i64,
        worker: &WorkerId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Push the lease deadline to at least `expires_at` if `worker` still
    /// holds the lease. Returns the resulting deadline.
    async fn extend_lease(
        &self,
        id: JobId,
        worker: &WorkerId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>>;

    /// Claimed → Running if `worker` still holds the lease.
    async fn mark_running(&self, id: JobId, worker: &WorkerId, now: DateTime<Utc>)
    -> AppResult<bool>;

    /// Claimed/Running → terminal if `worker` still holds the lease.
    async fn release(
        &self,
        id: JobId,
        worker: &WorkerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Claimed/Running jobs whose deadline is before `now`.
    async fn find_expired_leases(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>>;

    /// Count one delivery attempt against an expired lease and either
    /// requeue the job or fail it with `exhausted_message`.
    ///
    /// Only applies if `lock_version` still equals `expected_version` and
    /// the lease is still expired at `now`.
    async fn recover_expired(
        &self,
        id: JobId,
        expected_version: i64,
        exhausted_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Delete Completed/Failed jobs last written before `before`.
    async fn delete_terminal_before(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Build the store selected by `config.backend`.
pub async fn open_store(config: &DatabaseConfig) -> AppResult<Arc<dyn JobStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let db = DatabasePool::connect_migrated(config).await?;
            Ok(Arc::new(JobRepository::new(db.into_pool())))
        }
        StoreBackend::Memory => {
            info!("Using in-memory job store; leases are only shared within this process");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}
