//! # joblease-entity
//!
//! Domain entity models for JobLease. [`job::Job`] is the single
//! persisted row this subsystem coordinates on; everything else here is a
//! value object derived from it.

pub mod job;
pub mod lock;

pub use job::{Job, JobOutcome, JobStatus, NewJob};
pub use lock::LockStatus;
