//! Sleep job: holds its lease for a requested time.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing;

use joblease_entity::job::Job;

use crate::executor::{JobExecutionError, JobHandler};

/// Upper bound on a single sleep, one hour.
const MAX_SLEEP_MS: u64 = 3_600_000;

#[derive(Debug, Deserialize)]
struct SleepPayload {
    millis: u64,
}

/// Sleeps for `payload.millis` milliseconds, heartbeating through the runner.
#[derive(Debug, Default)]
pub struct SleepJobHandler;

#[async_trait]
impl JobHandler for SleepJobHandler {
    fn job_type(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let payload: SleepPayload = serde_json::from_value(job.payload.clone()).map_err(|e| {
            JobExecutionError::Permanent(format!("Invalid sleep payload: {}", e))
        })?;
        if payload.millis > MAX_SLEEP_MS {
            return Err(JobExecutionError::Permanent(format!(
                "Sleep of {}ms exceeds the {}ms limit",
                payload.millis, MAX_SLEEP_MS
            )));
        }

        tracing::debug!(job_id = %job.id, millis = payload.millis, "Sleeping");
        tokio::time::sleep(Duration::from_millis(payload.millis)).await;

        Ok(Some(serde_json::json!({ "slept_ms": payload.millis })))
    }
}
