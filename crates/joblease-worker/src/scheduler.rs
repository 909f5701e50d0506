//! Cron scheduler for the lease recovery sweep and retention cleanup.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use joblease_core::config::RecoveryConfig;
use joblease_core::error::AppError;

use crate::lease::LeaseManager;
use crate::queue::JobQueue;

/// Cron-based scheduler for the periodic lease maintenance tasks
pub struct RecoveryScheduler {
    scheduler: JobScheduler,
    leases: Arc<LeaseManager>,
    queue: Arc<JobQueue>,
    config: RecoveryConfig,
}

impl std::fmt::Debug for RecoveryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryScheduler")
            .field("schedule", &self.config.schedule)
            .field("retention_days", &self.config.retention_days)
            .finish()
    }
}

impl RecoveryScheduler {
    /// Create a new scheduler. Nothing runs until [`Self::start`].
    pub async fn new(
        leases: Arc<LeaseManager>,
        queue: Arc<JobQueue>,
        config: RecoveryConfig,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            leases,
            queue,
            config,
        })
    }

    /// Register the recovery sweep, plus retention cleanup when enabled
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        self.register_lease_recovery().await?;
        if self.config.retention_days > 0 {
            self.register_retention_cleanup().await?;
        }

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Recovery scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Recovery scheduler shut down");
        Ok(())
    }

    async fn register_lease_recovery(&self) -> Result<(), AppError> {
        let leases = Arc::clone(&self.leases);
        let job = CronJob::new_async(self.config.schedule.as_str(), move |_uuid, _lock| {
            let leases = Arc::clone(&leases);
            Box::pin(async move {
                tracing::trace!("Running lease recovery sweep");
                if let Err(e) = leases.recover_expired_leases().await {
                    tracing::error!("Lease recovery sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid recovery schedule '{}': {}",
                self.config.schedule, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add lease_recovery schedule: {}", e))
        })?;

        tracing::info!(schedule = %self.config.schedule, "Registered: lease_recovery");
        Ok(())
    }

    async fn register_retention_cleanup(&self) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let retention_days = self.config.retention_days;
        let job = CronJob::new_async(
            self.config.cleanup_schedule.as_str(),
            move |_uuid, _lock| {
                let queue = Arc::clone(&queue);
                Box::pin(async move {
                    tracing::debug!("Running terminal job cleanup");
                    if let Err(e) = queue.cleanup_terminal(retention_days).await {
                        tracing::error!("Terminal job cleanup failed: {}", e);
                    }
                })
            },
        )
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid cleanup schedule '{}': {}",
                self.config.cleanup_schedule, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add retention_cleanup schedule: {}", e))
        })?;

        tracing::info!(
            schedule = %self.config.cleanup_schedule,
            retention_days,
            "Registered: retention_cleanup"
        );
        Ok(())
    }
}
