//! Facade over the lease components.

use std::sync::Arc;

use chrono::Duration;

use joblease_core::clock::Clock;
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_database::JobStore;
use joblease_entity::job::JobOutcome;
use joblease_entity::lock::LockStatus;

use super::claim::{ClaimCoordinator, ClaimRequest, ClaimResult};
use super::heartbeat::{HeartbeatManager, HeartbeatResult};
use super::inspector::LockStatusInspector;
use super::lifecycle::LifecycleTransitioner;
use super::recovery::{LeaseRecoveryScanner, RecoveryReport};

/// The lease operations exposed to workers and the recovery scheduler.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    coordinator: ClaimCoordinator,
    heartbeats: HeartbeatManager,
    lifecycle: LifecycleTransitioner,
    scanner: LeaseRecoveryScanner,
    inspector: LockStatusInspector,
}

impl LeaseManager {
    /// Build all components over `store`, reading time from `clock`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            coordinator: ClaimCoordinator::new(Arc::clone(&store), Arc::clone(&clock)),
            heartbeats: HeartbeatManager::new(Arc::clone(&store), Arc::clone(&clock)),
            lifecycle: LifecycleTransitioner::new(Arc::clone(&store), Arc::clone(&clock)),
            scanner: LeaseRecoveryScanner::new(Arc::clone(&store), Arc::clone(&clock)),
            inspector: LockStatusInspector::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            clock,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// The clock all lease deadlines are computed from.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Claim the next eligible job.
    pub async fn claim(&self, request: &ClaimRequest) -> AppResult<ClaimResult> {
        self.coordinator.claim(request).await
    }

    /// Extend a lease held by `worker_id`.
    pub async fn heartbeat(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        extension: Duration,
    ) -> AppResult<HeartbeatResult> {
        self.heartbeats.heartbeat(job_id, worker_id, extension).await
    }

    /// Confirm that `worker_id` started the job.
    pub async fn mark_running(&self, job_id: JobId, worker_id: &WorkerId) -> AppResult<bool> {
        self.lifecycle.mark_running(job_id, worker_id).await
    }

    /// Finish the job and drop its lease.
    pub async fn release(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        outcome: &JobOutcome,
    ) -> AppResult<bool> {
        self.lifecycle.release(job_id, worker_id, outcome).await
    }

    /// Sweep expired leases.
    pub async fn recover_expired_leases(&self) -> AppResult<RecoveryReport> {
        self.scanner.recover_expired_leases().await
    }

    /// Ownership projection for `job_id`.
    pub async fn get_lock_status(&self, job_id: JobId) -> AppResult<LockStatus> {
        self.inspector.get_lock_status(job_id).await
    }
}
