//! Job types, the in-process queue and the workers that run them.

pub mod dispatch;
pub mod job;
pub mod pool;
pub mod queue;

pub use dispatch::Dispatcher;
pub use job::{CatalogChange, Job, JobEnvelope, ZoneChange};
pub use pool::WorkerPool;
pub use queue::{Delivery, JobQueue, JobState, LocalJobQueue, RetryPolicy};
