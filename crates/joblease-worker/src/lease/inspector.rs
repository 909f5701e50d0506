//! Read-only lock status projection.

use std::sync::Arc;

use joblease_core::clock::Clock;
use joblease_core::result::AppResult;
use joblease_core::types::JobId;
use joblease_database::JobStore;
use joblease_entity::lock::LockStatus;

/// Reports who holds a job's lease. Never writes.
#[derive(Debug, Clone)]
pub struct LockStatusInspector {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl LockStatusInspector {
    /// Create an inspector over `store`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current lock status of `job_id`. Unknown ids report unlocked with no status.
    pub async fn get_lock_status(&self, job_id: JobId) -> AppResult<LockStatus> {
        let job = self.store.find_by_id(job_id).await?;
        Ok(job.map_or_else(LockStatus::missing, |job| {
            LockStatus::of(&job, self.clock.now())
        }))
    }
}
