//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use joblease_core::clock::{Clock, ManualClock};
use joblease_core::error::AppError;
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_database::{JobFilter, JobStore, MemoryJobStore};
use joblease_entity::job::{Job, JobOutcome, JobStatus, NewJob};
use joblease_worker::{ClaimRequest, ClaimResult, JobCreateParams, JobQueue, LeaseManager};

/// Lease length used by every helper claim.
pub const LEASE: i64 = 5;

/// A job store, a hand-driven clock, and the operations built on them
pub struct TestHarness {
    /// Backing store, for direct reads
    pub store: Arc<dyn JobStore>,
    /// Clock shared by every component
    pub clock: Arc<ManualClock>,
    /// Lease operations
    pub leases: Arc<LeaseManager>,
    /// Submission
    pub queue: Arc<JobQueue>,
}

impl TestHarness {
    /// Create a harness over an empty in-memory store
    pub fn new() -> Self {
        Self::over(Arc::new(MemoryJobStore::new()))
    }

    /// Create a harness over `store`
    pub fn over(store: Arc<dyn JobStore>) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let leases = Arc::new(LeaseManager::new(Arc::clone(&store), clock.clone()));
        let queue = Arc::new(JobQueue::new(Arc::clone(&store), clock.clone(), 3));
        Self {
            store,
            clock,
            leases,
            queue,
        }
    }

    /// Submit a job with default settings
    pub async fn submit(&self, job_type: &str) -> JobId {
        self.submit_with(JobCreateParams::new(job_type)).await.id
    }

    /// Submit a job from explicit params
    pub async fn submit_with(&self, params: JobCreateParams) -> Job {
        self.queue.enqueue(params).await.expect("enqueue")
    }

    /// A claim request for `worker` with a `LEASE`-minute lease
    pub fn request(&self, worker: &str) -> ClaimRequest {
        ClaimRequest::new(WorkerId::new(worker), Duration::minutes(LEASE), 3)
    }

    /// Claim as `worker`, returning the job if one was leased
    pub async fn claim(&self, worker: &str) -> Option<Job> {
        match self.leases.claim(&self.request(worker)).await.expect("claim") {
            ClaimResult::Claimed(job) => Some(job),
            _ => None,
        }
    }

    /// Current record for `id`
    pub async fn job(&self, id: JobId) -> Job {
        self.store
            .find_by_id(id)
            .await
            .expect("find")
            .expect("job exists")
    }

    /// Move the shared clock forward
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Current time on the shared clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// In-memory store with injectable faults.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    inner: MemoryJobStore,
    lose_claims: AtomicBool,
    broken_recovery: Mutex<HashSet<JobId>>,
}

impl ScriptedStore {
    /// Make every compare-and-swap claim lose, as if another worker won each race
    pub fn lose_every_claim(&self, lose: bool) {
        self.lose_claims.store(lose, Ordering::SeqCst);
    }

    /// Make recovery writes for `id` fail with a database error
    pub fn break_recovery_of(&self, id: JobId) {
        self.broken_recovery
            .lock()
            .expect("lock")
            .insert(id);
    }
}

#[async_trait]
impl JobStore for ScriptedStore {
    async fn insert(&self, data: &NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        self.inner.insert(data, now).await
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        self.inner.find_by_id(id).await
    }

    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        self.inner.list(filter).await
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        self.inner.count_by_status(status).await
    }

    async fn find_claim_candidate(
        &self,
        tenant_scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        self.inner.find_claim_candidate(tenant_scope, now).await
    }

    async fn try_claim(
        &self,
        id: JobId,
        expected_version: i64,
        worker: &WorkerId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        if self.lose_claims.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner
            .try_claim(id, expected_version, worker, now, expires_at)
            .await
    }

    async fn extend_lease(
        &self,
        id: JobId,
        worker: &WorkerId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        self.inner.extend_lease(id, worker, expires_at, now).await
    }

    async fn mark_running(&self, id: JobId, worker: &WorkerId, now: DateTime<Utc>) -> AppResult<bool> {
        self.inner.mark_running(id, worker, now).await
    }

    async fn release(
        &self,
        id: JobId,
        worker: &WorkerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.inner.release(id, worker, outcome, now).await
    }

    async fn find_expired_leases(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>> {
        self.inner.find_expired_leases(now).await
    }

    async fn recover_expired(
        &self,
        id: JobId,
        expected_version: i64,
        exhausted_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        if self.broken_recovery.lock().expect("lock").contains(&id) {
            return Err(AppError::database("connection reset"));
        }
        self.inner
            .recover_expired(id, expected_version, exhausted_message, now)
            .await
    }

    async fn delete_terminal_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.inner.delete_terminal_before(before).await
    }
}
