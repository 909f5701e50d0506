//! Heartbeat manager: keep a lease alive while its holder is working.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{trace, warn};

use joblease_core::clock::Clock;
use joblease_core::error::AppError;
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_database::JobStore;

/// Outcome of a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum HeartbeatResult {
    /// The lease now runs until `expires_at`.
    Extended {
        /// New lease deadline.
        expires_at: DateTime<Utc>,
    },
    /// The caller no longer holds the lease and must stop working on the job.
    OwnershipLost,
}

impl HeartbeatResult {
    /// Whether the lease is still held.
    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended { .. })
    }
}

/// Extends leases for their current holder.
#[derive(Debug, Clone)]
pub struct HeartbeatManager {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl HeartbeatManager {
    /// Create a heartbeat manager over `store`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Move the deadline of `job_id` to `now + extension` if `worker_id`
    /// still holds it and the job is Claimed or Running.
    pub async fn heartbeat(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        extension: Duration,
    ) -> AppResult<HeartbeatResult> {
        if extension <= Duration::zero() {
            return Err(AppError::validation("Lease extension must be positive"));
        }

        let now = self.clock.now();
        let deadline = now.checked_add_signed(extension).ok_or_else(|| {
            AppError::validation(format!("Lease extension {extension} overflows the lease deadline"))
        })?;
        match self
            .store
            .extend_lease(job_id, worker_id, deadline, now)
            .await?
        {
            Some(expires_at) => {
                trace!(%job_id, %worker_id, %expires_at, "Lease extended");
                Ok(HeartbeatResult::Extended { expires_at })
            }
            None => {
                warn!(%job_id, %worker_id, "Heartbeat rejected, lease ownership lost");
                Ok(HeartbeatResult::OwnershipLost)
            }
        }
    }
}
