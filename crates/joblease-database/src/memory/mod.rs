//! Process-local store implementations.

pub mod job_store;

pub use job_store::MemoryJobStore;
