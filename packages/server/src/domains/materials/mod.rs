//! Materials domain - crawl jobs that discover social media content
//!
//! # Components
//!
//! - `service` - Facade used by the request layer (search, status, results, events)
//! - `jobs/` - Crawl job handler run by the kernel job worker
//! - `cache` - Query fingerprint cache of finished results
//! - `events` - Per-job progress events
//! - `models/` - Job payload, results, and facade views

pub mod cache;
pub mod error;
pub mod events;
pub mod jobs;
pub mod log_parser;
pub mod models;
pub mod payload;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use crate::kernel::jobs::{JobQueue, JobWorker, JobWorkerConfig};
use crate::kernel::ServerDeps;

pub use cache::{build_fingerprint, is_preferred_result_path, CacheEntry, MaterialsCache};
pub use error::CrawlError;
pub use events::{EventPayload, MaterialsEvent, MaterialsEvents};
pub use jobs::CrawlJobHandler;
pub use models::{
    JobResultView, JobStatusView, MaterialsJobData, MaterialsJobResult, SearchQuery,
    SearchResponse,
};
pub use service::MaterialsService;

/// Time a running job may exceed the crawl timeout before recovery fails it.
const STALL_GRACE: Duration = Duration::from_secs(60);

/// Facade and worker sharing one queue.
pub struct MaterialsPipeline {
    pub service: Arc<MaterialsService>,
    pub worker: JobWorker,
}

impl MaterialsPipeline {
    pub fn new(deps: &ServerDeps) -> Self {
        Self::with_worker_config(deps, JobWorkerConfig::default())
    }

    pub fn with_worker_config(deps: &ServerDeps, worker_config: JobWorkerConfig) -> Self {
        let queue = Arc::new(JobQueue::new(
            deps.store.clone(),
            deps.materials.queue_config(),
        ));
        let handler = Arc::new(CrawlJobHandler::new(deps, queue.clone()));
        let worker = JobWorker::with_config(
            queue.clone(),
            handler,
            JobWorkerConfig {
                stall_timeout: deps.materials.job_timeout + STALL_GRACE,
                ..worker_config
            },
        );

        Self {
            service: Arc::new(MaterialsService::new(deps, queue)),
            worker,
        }
    }
}
