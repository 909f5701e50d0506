//! Lifecycle transitioner: Claimed → Running, and leased → terminal.

use std::sync::Arc;

use tracing::{info, warn};

use joblease_core::clock::Clock;
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_database::JobStore;
use joblease_entity::job::JobOutcome;

/// Moves leased jobs through their lifecycle on behalf of the lease holder.
///
/// A worker that has lost its lease gets `false` back and the record is
/// left untouched.
#[derive(Debug, Clone)]
pub struct LifecycleTransitioner {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl LifecycleTransitioner {
    /// Create a transitioner over `store`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Claimed → Running. Records `started_at`.
    pub async fn mark_running(&self, job_id: JobId, worker_id: &WorkerId) -> AppResult<bool> {
        let moved = self
            .store
            .mark_running(job_id, worker_id, self.clock.now())
            .await?;
        if moved {
            info!(%job_id, %worker_id, "Job running");
        } else {
            warn!(%job_id, %worker_id, "Mark running rejected, job not claimed by this worker");
        }
        Ok(moved)
    }

    /// Claimed/Running → Completed or Failed, clearing the lease deadline.
    pub async fn release(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        outcome: &JobOutcome,
    ) -> AppResult<bool> {
        let released = self
            .store
            .release(job_id, worker_id, outcome, self.clock.now())
            .await?;
        if released {
            info!(%job_id, %worker_id, status = %outcome.final_status(), "Job released");
        } else {
            warn!(%job_id, %worker_id, "Release rejected, lease ownership lost");
        }
        Ok(released)
    }
}
