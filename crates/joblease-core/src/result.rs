//! Convenience result type alias for JobLease.

use crate::error::AppError;

/// A specialized `Result` type for JobLease operations.
pub type AppResult<T> = Result<T, AppError>;
