//! # joblease-database
//!
//! The job record store. [`store::JobStore`] is the conditional-write
//! primitive every lease operation is built on; [`JobRepository`] backs it
//! with PostgreSQL and [`MemoryJobStore`] with a process-local map.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryJobStore;
pub use repositories::job::JobRepository;
pub use store::{JobFilter, JobStore, open_store};
