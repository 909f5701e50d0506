//! Worker runner: claims jobs, runs them under a heartbeat, releases them.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing;

use joblease_core::config::{LeaseConfig, WorkerConfig};
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_entity::job::{Job, JobOutcome};

use crate::executor::{JobExecutionError, JobExecutor};
use crate::lease::{ClaimRequest, ClaimResult, HeartbeatResult, LeaseManager};

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExecutionReport {
    /// Handler succeeded and the job was released as Completed.
    Completed {
        /// Job id.
        job_id: JobId,
    },
    /// Handler failed and the job was released as Failed.
    Failed {
        /// Job id.
        job_id: JobId,
        /// Stored error message.
        error: String,
    },
    /// The lease was lost; the job was abandoned without writing to it.
    OwnershipLost {
        /// Job id.
        job_id: JobId,
    },
    /// The store failed while confirming start or releasing. The lease will
    /// expire and the recovery sweep re-delivers the job.
    Abandoned {
        /// Job id.
        job_id: JobId,
        /// Store error.
        reason: String,
    },
}

/// Main worker runner that polls for claimable jobs and executes them
#[derive(Debug)]
pub struct WorkerRunner {
    leases: Arc<LeaseManager>,
    executor: Arc<JobExecutor>,
    config: WorkerConfig,
    lease: LeaseConfig,
    worker_id: WorkerId,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        leases: Arc<LeaseManager>,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        lease: LeaseConfig,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            leases,
            executor,
            config,
            lease,
            worker_id,
        }
    }

    fn claim_request(&self) -> ClaimRequest {
        ClaimRequest {
            worker_id: self.worker_id.clone(),
            tenant_scope: self.config.tenant_scope.clone(),
            lease_duration: self.lease.lease_duration(),
            claim_retry_budget: self.lease.claim_retry_budget,
        }
    }

    /// Claim one job and run it to completion on the current task.
    ///
    /// Returns `None` when nothing was claimed.
    pub async fn run_once(&self) -> AppResult<Option<ExecutionReport>> {
        match self.leases.claim(&self.claim_request()).await? {
            ClaimResult::Claimed(job) => Ok(Some(
                process_job(
                    Arc::clone(&self.leases),
                    Arc::clone(&self.executor),
                    self.worker_id.clone(),
                    self.lease.clone(),
                    job,
                )
                .await,
            )),
            ClaimResult::NothingAvailable | ClaimResult::ContentionExhausted { .. } => Ok(None),
        }
    }

    /// Start the worker runner; runs until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            poll_interval_seconds = self.config.poll_interval_seconds,
            tenant_scope = ?self.config.tenant_scope,
            lease_duration_seconds = self.lease.lease_duration_seconds,
            "Worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            if *cancel.borrow() {
                tracing::info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                break;
            }

            if self.poll_and_spawn(&semaphore).await {
                continue;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "Worker shutting down");
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {}
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Waiting for in-flight jobs to complete");

        let max_permits = u32::try_from(self.config.concurrency).unwrap_or(u32::MAX);
        let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
        if time::timeout(grace, semaphore.acquire_many(max_permits))
            .await
            .is_err()
        {
            tracing::warn!(
                worker_id = %self.worker_id,
                "Shutdown grace elapsed with jobs still running; their leases will expire"
            );
        }

        tracing::info!(worker_id = %self.worker_id, "Worker shut down complete");
    }

    /// Claim a job into a free slot. Returns whether one was claimed.
    async fn poll_and_spawn(&self, semaphore: &Arc<Semaphore>) -> bool {
        let permit = match Arc::clone(semaphore).try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied, waiting...");
                return false;
            }
        };

        match self.leases.claim(&self.claim_request()).await {
            Ok(ClaimResult::Claimed(job)) => {
                let leases = Arc::clone(&self.leases);
                let executor = Arc::clone(&self.executor);
                let worker_id = self.worker_id.clone();
                let lease = self.lease.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    process_job(leases, executor, worker_id, lease, job).await;
                });
                true
            }
            Ok(ClaimResult::NothingAvailable) => {
                tracing::trace!("No jobs available");
                false
            }
            Ok(ClaimResult::ContentionExhausted { tries }) => {
                tracing::debug!(tries, "Claim contention exhausted, backing off");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim job");
                false
            }
        }
    }
}

/// Mark running, execute under a heartbeat, and release.
async fn process_job(
    leases: Arc<LeaseManager>,
    executor: Arc<JobExecutor>,
    worker_id: WorkerId,
    lease: LeaseConfig,
    job: Job,
) -> ExecutionReport {
    let job_id = job.id;

    match leases.mark_running(job_id, &worker_id).await {
        Ok(true) => {}
        Ok(false) => return ExecutionReport::OwnershipLost { job_id },
        Err(e) => {
            tracing::error!(%job_id, error = %e, "Failed to mark job running");
            return ExecutionReport::Abandoned {
                job_id,
                reason: e.to_string(),
            };
        }
    }

    tracing::info!(
        %job_id,
        job_type = %job.job_type,
        delivery = job.attempts + 1,
        max_attempts = job.max_attempts,
        "Processing job"
    );

    let (lost_tx, lost_rx) = oneshot::channel();
    let heartbeat = AbortOnDrop(tokio::spawn(heartbeat_loop(
        Arc::clone(&leases),
        job_id,
        worker_id.clone(),
        lease.clone(),
        lost_tx,
    )));

    let result = tokio::select! {
        result = executor.execute(&job) => Some(result),
        _ = lost_rx => None,
    };
    drop(heartbeat);

    let Some(result) = result else {
        tracing::warn!(%job_id, %worker_id, "Lease lost mid-execution, abandoning job");
        return ExecutionReport::OwnershipLost { job_id };
    };

    let outcome = match result {
        Ok(value) => JobOutcome::completed(value),
        Err(e) => {
            match &e {
                JobExecutionError::Transient(msg) => {
                    tracing::warn!(%job_id, error = %msg, "Job failed (transient)")
                }
                JobExecutionError::Permanent(msg) => {
                    tracing::error!(%job_id, error = %msg, "Job failed permanently")
                }
                JobExecutionError::Internal(err) => {
                    tracing::error!(%job_id, error = %err, "Job internal error")
                }
            }
            e.to_outcome()
        }
    };

    match leases.release(job_id, &worker_id, &outcome).await {
        Ok(true) => match outcome {
            JobOutcome::Completed { .. } => ExecutionReport::Completed { job_id },
            JobOutcome::Failed { error_message } => ExecutionReport::Failed {
                job_id,
                error: error_message,
            },
        },
        Ok(false) => ExecutionReport::OwnershipLost { job_id },
        Err(e) => {
            tracing::error!(%job_id, error = %e, "Failed to release job");
            ExecutionReport::Abandoned {
                job_id,
                reason: e.to_string(),
            }
        }
    }
}

/// Stops the heartbeat task even if the job future is dropped mid-flight.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Extend the lease every heartbeat interval; signal `lost` once ownership is gone.
async fn heartbeat_loop(
    leases: Arc<LeaseManager>,
    job_id: JobId,
    worker_id: WorkerId,
    lease: LeaseConfig,
    lost: oneshot::Sender<()>,
) {
    let every = lease.heartbeat_interval().max(Duration::from_secs(1));
    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match leases
            .heartbeat(job_id, &worker_id, lease.lease_duration())
            .await
        {
            Ok(HeartbeatResult::Extended { .. }) => {}
            Ok(HeartbeatResult::OwnershipLost) => {
                let _ = lost.send(());
                return;
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Heartbeat failed, retrying next interval");
            }
        }
    }
}
