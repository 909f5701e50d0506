//! Echo job: completes immediately with its payload as the result.

use async_trait::async_trait;
use serde_json::Value;

use joblease_entity::job::Job;

use crate::executor::{JobExecutionError, JobHandler};

/// Returns the job payload unchanged.
#[derive(Debug, Default)]
pub struct EchoJobHandler;

#[async_trait]
impl JobHandler for EchoJobHandler {
    fn job_type(&self) -> &str {
        "echo"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        Ok(Some(job.payload.clone()))
    }
}
