//! # joblease-core
//!
//! Core crate for JobLease. Contains configuration schemas, typed
//! identifiers, the clock abstraction used for all lease arithmetic,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other JobLease crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AppError;
pub use result::AppResult;
