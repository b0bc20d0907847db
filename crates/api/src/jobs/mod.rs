//! Background job infrastructure: tracker, worker pool, retention sweeper.

pub mod pool;
pub mod sweeper;
pub mod tracker;

pub use pool::{JobSubmitter, SubmitError, WorkerPool};
pub use sweeper::spawn_retention_sweeper;
pub use tracker::JobTracker;
