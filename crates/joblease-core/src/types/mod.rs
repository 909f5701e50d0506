//! Core type definitions used across the JobLease workspace.

pub mod id;

pub use id::{JobId, WorkerId};
