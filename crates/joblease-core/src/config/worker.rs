//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Worker loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fixed worker id. A random `worker-xxxxxxxx` id is generated when unset.
    #[serde(default)]
    pub worker_id: Option<String>,
    /// Only claim jobs belonging to this tenant.
    #[serde(default)]
    pub tenant_scope: Option<String>,
    /// Number of concurrent job processing tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval in seconds between job queue polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// How long shutdown waits for in-flight jobs, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            worker_id: None,
            tenant_scope: None,
            concurrency: default_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    5
}

fn default_shutdown_grace() -> u64 {
    30
}
