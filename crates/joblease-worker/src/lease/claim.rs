//! Claim coordinator: pick the best eligible job and lease it with a
//! compare-and-swap on `lock_version`.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info};

use joblease_core::clock::Clock;
use joblease_core::error::AppError;
use joblease_core::result::AppResult;
use joblease_core::types::WorkerId;
use joblease_database::JobStore;
use joblease_entity::job::Job;

/// Parameters for one claim call.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    /// Worker requesting the lease.
    pub worker_id: WorkerId,
    /// Restrict candidates to this tenant.
    pub tenant_scope: Option<String>,
    /// Length of the lease granted on success.
    pub lease_duration: Duration,
    /// Re-selections allowed after losing a race, on top of the first try.
    pub claim_retry_budget: u32,
}

impl ClaimRequest {
    /// A request with no tenant filter.
    pub fn new(worker_id: WorkerId, lease_duration: Duration, claim_retry_budget: u32) -> Self {
        Self {
            worker_id,
            tenant_scope: None,
            lease_duration,
            claim_retry_budget,
        }
    }

    /// Only consider jobs in `tenant`.
    pub fn for_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_scope = Some(tenant.into());
        self
    }
}

/// Outcome of a claim call. None of these are errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClaimResult {
    /// The job is now leased to the caller.
    Claimed(Job),
    /// No eligible job exists.
    NothingAvailable,
    /// Every try lost a race to another worker.
    ContentionExhausted {
        /// Compare-and-swap attempts made.
        tries: u32,
    },
}

impl ClaimResult {
    /// The claimed job, if any.
    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::Claimed(job) => Some(job),
            _ => None,
        }
    }

    /// Take the claimed job, if any.
    pub fn into_job(self) -> Option<Job> {
        match self {
            Self::Claimed(job) => Some(job),
            _ => None,
        }
    }

    /// Whether a job was claimed.
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// Selects and atomically claims the next eligible job.
#[derive(Debug, Clone)]
pub struct ClaimCoordinator {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl ClaimCoordinator {
    /// Create a coordinator over `store`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Claim the best eligible job for `request.worker_id`.
    ///
    /// Makes at most `claim_retry_budget + 1` compare-and-swap attempts,
    /// re-selecting the candidate after every lost race.
    ///
    /// Taking over an expired lease counts as a delivery attempt, so a
    /// Claimed/Running job is only eligible while `attempts + 1 <
    /// max_attempts`. An expired job on its last attempt (for example any
    /// expired job with `max_attempts = 1`) is reported as
    /// [`ClaimResult::NothingAvailable`] and left for the recovery sweep
    /// to fail.
    pub async fn claim(&self, request: &ClaimRequest) -> AppResult<ClaimResult> {
        if request.lease_duration <= Duration::zero() {
            return Err(AppError::validation("Lease duration must be positive"));
        }

        let tries = request.claim_retry_budget.saturating_add(1);
        for attempt in 1..=tries {
            let now = self.clock.now();
            let Some(candidate) = self
                .store
                .find_claim_candidate(request.tenant_scope.as_deref(), now)
                .await?
            else {
                return Ok(ClaimResult::NothingAvailable);
            };

            let Some(expires_at) = now.checked_add_signed(request.lease_duration) else {
                return Err(AppError::validation(format!(
                    "Lease duration {} overflows the lease deadline",
                    request.lease_duration
                )));
            };
            if let Some(job) = self
                .store
                .try_claim(
                    candidate.id,
                    candidate.lock_version,
                    &request.worker_id,
                    now,
                    expires_at,
                )
                .await?
            {
                info!(
                    job_id = %job.id,
                    worker_id = %request.worker_id,
                    lock_version = job.lock_version,
                    attempts = job.attempts,
                    lock_expires_at = %expires_at,
                    "Claimed job"
                );
                return Ok(ClaimResult::Claimed(job));
            }

            debug!(
                job_id = %candidate.id,
                worker_id = %request.worker_id,
                attempt,
                tries,
                "Lost claim race, re-selecting"
            );
        }

        debug!(worker_id = %request.worker_id, tries, "Claim contention exhausted");
        Ok(ClaimResult::ContentionExhausted { tries })
    }
}
