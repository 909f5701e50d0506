//! Lease timing configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Longest lease `validate` accepts: one week.
pub const MAX_LEASE_DURATION_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Lease duration, heartbeat cadence, and retry budgets.
///
/// `claim_retry_budget` bounds how many times a single claim call
/// re-selects after losing a compare-and-swap race. It is unrelated to
/// `default_max_attempts`, the persisted per-job delivery budget consumed
/// by lease losses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Length of a freshly claimed lease in seconds.
    #[serde(default = "default_lease_duration")]
    pub lease_duration_seconds: u64,
    /// Interval between heartbeats in seconds. Must be shorter than the lease.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Extra contention retries per claim call after the first attempt.
    #[serde(default = "default_claim_retry_budget")]
    pub claim_retry_budget: u32,
    /// Delivery attempts assigned to jobs submitted without an explicit budget.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: i32,
}

impl LeaseConfig {
    /// Lease duration as a chrono duration, saturating at `Duration::MAX`.
    pub fn lease_duration(&self) -> Duration {
        i64::try_from(self.lease_duration_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Heartbeat interval as a std duration, for `tokio::time`.
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            lease_duration_seconds: default_lease_duration(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            claim_retry_budget: default_claim_retry_budget(),
            default_max_attempts: default_max_attempts(),
        }
    }
}

fn default_lease_duration() -> u64 {
    300
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_claim_retry_budget() -> u32 {
    3
}

fn default_max_attempts() -> i32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_duration_saturates_instead_of_wrapping() {
        let config = LeaseConfig {
            lease_duration_seconds: u64::MAX,
            ..LeaseConfig::default()
        };
        assert_eq!(config.lease_duration(), Duration::MAX);
        assert_eq!(LeaseConfig::default().lease_duration(), Duration::minutes(5));
    }
}
