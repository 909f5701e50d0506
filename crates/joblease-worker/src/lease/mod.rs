//! Lease operations over a [`JobStore`](joblease_database::JobStore).
//!
//! Each component owns one kind of conditional write. Workers go through
//! [`LeaseManager`]; the recovery sweep is normally driven by
//! [`RecoveryScheduler`](crate::scheduler::RecoveryScheduler).

pub mod claim;
pub mod heartbeat;
pub mod inspector;
pub mod lifecycle;
pub mod manager;
pub mod recovery;

pub use claim::{ClaimCoordinator, ClaimRequest, ClaimResult};
pub use heartbeat::{HeartbeatManager, HeartbeatResult};
pub use inspector::LockStatusInspector;
pub use lifecycle::LifecycleTransitioner;
pub use manager::LeaseManager;
pub use recovery::{LeaseRecoveryScanner, RecoveryReport};
