//! Job claim-and-lease coordination for JobLease workers.
//!
//! This crate provides:
//! - The lease operations (claim, heartbeat, mark running, release,
//!   recovery sweep, lock inspection) behind [`LeaseManager`]
//! - A job queue for submission and queue statistics
//! - A job executor that dispatches claimed jobs to registered handlers
//! - A worker runner that claims, heartbeats, and releases jobs
//! - A cron scheduler that runs the lease recovery sweep

pub mod executor;
pub mod jobs;
pub mod lease;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use lease::{ClaimRequest, ClaimResult, HeartbeatResult, LeaseManager, RecoveryReport};
pub use queue::{JobCreateParams, JobQueue, QueueStats};
pub use runner::{ExecutionReport, WorkerRunner};
pub use scheduler::RecoveryScheduler;
