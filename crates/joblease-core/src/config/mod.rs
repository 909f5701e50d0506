//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod lease;
pub mod logging;
pub mod recovery;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::{DatabaseConfig, StoreBackend};
pub use self::lease::{LeaseConfig, MAX_LEASE_DURATION_SECONDS};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::recovery::{MAX_RETENTION_DAYS, RecoveryConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration (base file + environment overlay + `JOBLEASE__*`
/// environment variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Lease timing and delivery budget.
    #[serde(default)]
    pub lease: LeaseConfig,
    /// Worker loop settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Lease recovery sweep settings.
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Merges `config_path`, an optional overlay named after the
    /// `JOBLEASE_ENV` environment (e.g. `config/production.toml`), and
    /// environment variables prefixed with `JOBLEASE__`.
    pub fn load(config_path: &str) -> Result<Self, AppError> {
        let env = std::env::var("JOBLEASE_ENV").unwrap_or_else(|_| "development".to_string());
        let overlay = std::path::Path::new(config_path)
            .parent()
            .map(|dir| dir.join(&env))
            .and_then(|p| p.to_str().map(str::to_string))
            .unwrap_or_else(|| format!("config/{env}"));

        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&overlay).required(false))
            .add_source(
                config::Environment::with_prefix("JOBLEASE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        tracing::debug!(path = config_path, env = %env, "Configuration loaded");
        Ok(config)
    }

    /// Reject settings that would break lease ownership.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.lease.lease_duration_seconds == 0 {
            return Err(AppError::configuration(
                "lease.lease_duration_seconds must be greater than zero",
            ));
        }
        if self.lease.lease_duration_seconds > MAX_LEASE_DURATION_SECONDS {
            return Err(AppError::configuration(format!(
                "lease.lease_duration_seconds ({}) must not exceed {MAX_LEASE_DURATION_SECONDS}",
                self.lease.lease_duration_seconds
            )));
        }
        if self.lease.heartbeat_interval_seconds == 0 {
            return Err(AppError::configuration(
                "lease.heartbeat_interval_seconds must be greater than zero",
            ));
        }
        if self.lease.heartbeat_interval_seconds >= self.lease.lease_duration_seconds {
            return Err(AppError::configuration(format!(
                "lease.heartbeat_interval_seconds ({}) must be shorter than lease.lease_duration_seconds ({})",
                self.lease.heartbeat_interval_seconds, self.lease.lease_duration_seconds
            )));
        }
        if self.lease.default_max_attempts < 1 {
            return Err(AppError::configuration(
                "lease.default_max_attempts must be at least 1",
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration(
                "worker.concurrency must be at least 1",
            ));
        }
        if self.recovery.retention_days > MAX_RETENTION_DAYS {
            return Err(AppError::configuration(format!(
                "recovery.retention_days ({}) must not exceed {MAX_RETENTION_DAYS}",
                self.recovery.retention_days
            )));
        }
        if self.logging.log_format().is_none() {
            return Err(AppError::configuration(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }
}
