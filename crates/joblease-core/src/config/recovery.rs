//! Lease recovery sweep configuration.

use serde::{Deserialize, Serialize};

/// Longest retention `validate` accepts: a hundred years.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Schedule for the lease recovery sweep and terminal-job retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Whether this process runs the recovery sweep.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression for the sweep (seconds first).
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Cron expression for the retention cleanup.
    #[serde(default = "default_cleanup_schedule")]
    pub cleanup_schedule: String,
    /// Completed/failed jobs older than this many days are deleted. `0` disables cleanup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            schedule: default_schedule(),
            cleanup_schedule: default_cleanup_schedule(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 * * * * *".to_string()
}

fn default_cleanup_schedule() -> String {
    "0 0 3 * * *".to_string()
}

fn default_retention_days() -> u32 {
    30
}
