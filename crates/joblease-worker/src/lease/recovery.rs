//! Lease recovery scanner: reclaim jobs whose holder went silent.
//!
//! This is the only path that returns a crashed worker's job to the queue.
//! Every expired lease is recovered with its own conditional write; a
//! failure on one job is logged and the sweep moves on.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use joblease_core::clock::Clock;
use joblease_core::result::AppResult;
use joblease_core::types::JobId;
use joblease_database::JobStore;
use joblease_entity::job::{Job, JobStatus};

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Jobs requeued or failed by this sweep.
    pub recovered_count: usize,
    /// Ids of those jobs, in lease-expiry order.
    pub job_ids: Vec<JobId>,
    /// Subset returned to Queued.
    pub requeued: Vec<JobId>,
    /// Subset failed permanently after exhausting delivery attempts.
    pub exhausted: Vec<JobId>,
    /// Expired leases that changed hands before they could be recovered.
    pub skipped: usize,
    /// Expired leases whose recovery write failed.
    pub errors: usize,
}

/// Periodic sweep over expired leases.
#[derive(Debug, Clone)]
pub struct LeaseRecoveryScanner {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl LeaseRecoveryScanner {
    /// Create a scanner over `store`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Requeue or permanently fail every Claimed/Running job whose lease
    /// deadline has passed.
    pub async fn recover_expired_leases(&self) -> AppResult<RecoveryReport> {
        let now = self.clock.now();
        let expired = self.store.find_expired_leases(now).await?;
        let mut report = RecoveryReport::default();

        for job in &expired {
            match self
                .store
                .recover_expired(job.id, job.lock_version, &exhausted_message(job), now)
                .await
            {
                Ok(Some(recovered)) => {
                    report.job_ids.push(recovered.id);
                    if recovered.status == JobStatus::Failed {
                        warn!(
                            job_id = %recovered.id,
                            previous_owner = ?job.claimed_by,
                            attempts = recovered.attempts,
                            max_attempts = recovered.max_attempts,
                            "Lease expired, delivery attempts exhausted; job failed"
                        );
                        report.exhausted.push(recovered.id);
                    } else {
                        info!(
                            job_id = %recovered.id,
                            previous_owner = ?job.claimed_by,
                            attempts = recovered.attempts,
                            max_attempts = recovered.max_attempts,
                            "Lease expired; job requeued"
                        );
                        report.requeued.push(recovered.id);
                    }
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Failed to recover expired lease");
                    report.errors += 1;
                }
            }
        }

        report.recovered_count = report.job_ids.len();
        if report.recovered_count > 0 || report.errors > 0 {
            info!(
                recovered = report.recovered_count,
                requeued = report.requeued.len(),
                exhausted = report.exhausted.len(),
                skipped = report.skipped,
                errors = report.errors,
                "Lease recovery sweep finished"
            );
        }
        Ok(report)
    }
}

/// Message stored on a job failed for running out of delivery attempts.
fn exhausted_message(job: &Job) -> String {
    format!(
        "Lease expired without completion; delivery attempts exhausted ({}/{})",
        job.max_attempts, job.max_attempts
    )
}
