//! Built-in job handlers.
//!
//! Real deployments register their own [`JobHandler`](crate::executor::JobHandler)s;
//! these two are enough to smoke-test a worker and its heartbeats.

pub mod echo;
pub mod sleep;

pub use echo::EchoJobHandler;
pub use sleep::SleepJobHandler;
