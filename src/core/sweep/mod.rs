//! Retention sweep
//!
//! Anonymizes records whose legal basis has expired.

pub mod coordinator;
pub mod summary;

pub use coordinator::RetentionSweep;
pub use summary::{SweepFailure, SweepSummary};
