//! Job infrastructure for background crawl execution.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`JobQueue`] - Key-value backed job queue with retries and a dead-letter list
//! - [`JobWorker`] - Long-running service that claims and executes jobs
//! - [`Job`] - Job record with state and progress
//!
//! # Architecture
//!
//! ```text
//! MaterialsService.search()
//!     │
//!     └─► JobQueue.enqueue(job_id, payload)
//!             └─► SET NX job record, RPUSH ready list
//!
//! JobWorker
//!     │
//!     ├─► JobQueue.claim()
//!     ├─► JobHandler.execute(job)
//!     └─► Mark succeeded/failed, then notify the handler
//! ```
//!
//! Domain-specific handlers live in their respective domains.
//! This module only provides the infrastructure.

mod job;
mod queue;
mod worker;

pub use job::{ErrorKind, Job, JobProgress, JobState};
pub use queue::{
    backoff_delay, ClaimedJob, EnqueueResult, FailOutcome, JobQueue, QueueConfig, DEFAULT_RETENTION,
};
pub use worker::{JobError, JobHandler, JobWorker, JobWorkerConfig};
