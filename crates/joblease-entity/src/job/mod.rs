//! Job record entities.

pub mod model;
pub mod outcome;
pub mod status;

pub use model::{Job, NewJob};
pub use outcome::JobOutcome;
pub use status::JobStatus;
