//! Job worker service for processing queued jobs.
//!
//! The `JobWorker` is a long-running service that:
//! - Claims ready jobs from the [`JobQueue`], one at a time
//! - Hands each job to a [`JobHandler`]
//! - Records success or failure (retry with backoff, then dead letter)
//! - Fails jobs left `running` past the stall timeout
//!
//! # Architecture
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► handler.on_startup(), queue.recover_stalled()
//!     ├─► queue.claim()
//!     ├─► handler.execute(job)
//!     ├─► queue.mark_succeeded / queue.mark_failed
//!     └─► handler.on_succeeded / handler.on_failed
//! ```
//!
//! Concurrency is fixed at one job: the handler drives a singleton external
//! resource.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::ErrorKind;
use super::queue::{ClaimedJob, FailOutcome, JobQueue};

/// Error returned by a [`JobHandler`], tagged with whether the queue should retry.
#[derive(Debug)]
pub struct JobError {
    pub kind: ErrorKind,
    pub source: anyhow::Error,
}

impl JobError {
    pub fn retryable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            kind: ErrorKind::Retryable,
            source: source.into(),
        }
    }

    pub fn non_retryable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            kind: ErrorKind::NonRetryable,
            source: source.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

/// Infrastructure failures surfaced with `?` are retryable.
impl From<anyhow::Error> for JobError {
    fn from(source: anyhow::Error) -> Self {
        Self::retryable(source)
    }
}

/// Domain logic run by the worker for each claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Called once before the worker starts claiming jobs.
    async fn on_startup(&self) -> Result<()> {
        Ok(())
    }

    /// Execute the job and return the value stored as its result.
    async fn execute(&self, job: &ClaimedJob) -> Result<serde_json::Value, JobError>;

    /// Called after the queue recorded the job as succeeded.
    async fn on_succeeded(&self, _job: &ClaimedJob, _result: &serde_json::Value) {}

    /// Called after the queue recorded a failure.
    async fn on_failed(&self, _job: &ClaimedJob, _error: &JobError, _outcome: &FailOutcome) {}
}

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// How long to wait when no jobs are available
    pub idle_interval: Duration,
    /// Running jobs older than this are failed on recovery passes
    pub stall_timeout: Duration,
    /// Minimum time between recovery passes while idle
    pub recovery_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            stall_timeout: Duration::from_secs(30 * 60),
            recovery_interval: Duration::from_secs(60),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl JobWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

pub struct JobWorker {
    queue: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    config: JobWorkerConfig,
}

impl JobWorker {
    pub fn new(queue: Arc<JobQueue>, handler: Arc<dyn JobHandler>) -> Self {
        Self::with_config(queue, handler, JobWorkerConfig::default())
    }

    pub fn with_config(
        queue: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        config: JobWorkerConfig,
    ) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    async fn recover_stalled(&self) {
        match self.queue.recover_stalled(self.config.stall_timeout).await {
            Ok(ids) if !ids.is_empty() => {
                warn!(count = ids.len(), "failed stalled jobs");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "failed to recover stalled jobs"),
        }
    }

    /// Claim and process at most one job. Returns whether a job was processed.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> Result<bool> {
        let Some(job) = self.queue.claim().await? else {
            return Ok(false);
        };
        self.process_job(job, shutdown).await;
        Ok(true)
    }

    /// Process a single claimed job.
    async fn process_job(&self, job: ClaimedJob, shutdown: &CancellationToken) {
        let job_id = job.id.clone();
        info!(
            job_id = %job_id,
            attempt = job.attempt(),
            worker_id = %self.config.worker_id,
            "job started"
        );

        let result = tokio::select! {
            result = self.handler.execute(&job) => result,
            _ = shutdown.cancelled() => Err(JobError::retryable(anyhow::anyhow!("worker shut down"))),
        };

        match result {
            Ok(value) => {
                debug!(job_id = %job_id, "job succeeded");
                if let Err(e) = self.queue.mark_succeeded(&job_id, value.clone()).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                    return;
                }
                self.handler.on_succeeded(&job, &value).await;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, kind = ?e.kind, "job failed");
                let outcome = match self
                    .queue
                    .mark_failed(&job_id, &e.to_string(), e.kind)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(mark_err) => {
                        error!(job_id = %job_id, error = %mark_err, "failed to mark job as failed");
                        return;
                    }
                };
                self.handler.on_failed(&job, &e, &outcome).await;
            }
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(worker_id = %self.config.worker_id, "job worker starting");

        if let Err(e) = self.handler.on_startup().await {
            warn!(error = %e, "job handler startup hook failed");
        }
        self.recover_stalled().await;
        let mut last_recovery = Instant::now();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.run_once(&shutdown).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => error!(error = %e, "failed to claim job"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.idle_interval) => {}
            }
            if last_recovery.elapsed() >= self.config.recovery_interval {
                self.recover_stalled().await;
                last_recovery = Instant::now();
            }
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
        Ok(())
    }
}
