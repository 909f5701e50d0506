//! Terminal outcome supplied when a worker releases its lease.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::JobStatus;

/// How a leased job finished. The payloads are opaque to the lease core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    /// The job succeeded, optionally producing a result document.
    Completed {
        /// Result data stored on the record.
        result: Option<Value>,
    },
    /// The job failed or was abandoned by its worker.
    Failed {
        /// Error message stored on the record.
        error_message: String,
    },
}

impl JobOutcome {
    /// Successful outcome.
    pub fn completed(result: Option<Value>) -> Self {
        Self::Completed { result }
    }

    /// Failed outcome.
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self::Failed {
            error_message: error_message.into(),
        }
    }

    /// The terminal status this outcome writes.
    pub fn final_status(&self) -> JobStatus {
        match self {
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }

    /// Result document, if any.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Completed { result } => result.as_ref(),
            Self::Failed { .. } => None,
        }
    }

    /// Error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error_message } => Some(error_message),
        }
    }
}
