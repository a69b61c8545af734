//! Key-value backed job queue.
//!
//! Layout, for a queue named `N`:
//! - `N:job:<id>` - JSON [`Job`] record, the single source of truth for state
//! - `N:ready` - FIFO list of job ids waiting to be claimed
//! - `N:active` - ids currently claimed by a worker
//! - the dead-letter list holds serialized records of exhausted jobs
//!
//! Every change writes the record before touching the lists, and recovery
//! reconciles records against the lists, so a failed store call never loses
//! a job.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use super::job::{ErrorKind, Job, JobProgress, JobState};
use crate::kernel::kv::KeyValueStore;

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Job was enqueued under the given id
    Created(String),
    /// A job with this id already exists, nothing was enqueued
    Duplicate(String),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> &str {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// What happened to a job after a failure was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Requeued; claimable again after `delay`.
    Retrying { attempt: u32, delay: Duration },
    /// Terminal failure, not retried.
    Failed,
    /// Terminal failure after exhausting retries; copied to the dead-letter list.
    DeadLettered,
}

impl FailOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FailOutcome::Retrying { .. })
    }
}

/// A claimed job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    /// The job ID
    pub id: String,
    /// The job record as of the claim
    pub job: Job,
}

impl ClaimedJob {
    /// Deserialize the job payload.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.job.data.clone())
            .map_err(|e| anyhow!("failed to deserialize job {} payload: {}", self.id, e))
    }

    pub fn attempt(&self) -> u32 {
        self.job.attempt
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub name: String,
    pub dead_letter_name: String,
    /// Attempts allowed for retryable failures.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `backoff * 2^(n-1)`.
    pub backoff: Duration,
    /// How long finished records and dead letters are kept. `None` keeps them
    /// forever.
    pub retention: Option<Duration>,
}

/// Finished jobs are kept for a week.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            dead_letter_name: format!("{}-dlq", name),
            name,
            max_attempts: 3,
            backoff: Duration::from_secs(5),
            retention: Some(DEFAULT_RETENTION),
        }
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Exponential backoff for the retry following attempt `attempt` (1-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    base.saturating_mul(2u32.pow(exponent)).min(MAX_BACKOFF)
}

pub struct JobQueue {
    store: Arc<dyn KeyValueStore>,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, config: QueueConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn job_prefix(&self) -> String {
        format!("{}:job:", self.config.name)
    }

    fn job_key(&self, job_id: &str) -> String {
        format!("{}{}", self.job_prefix(), job_id)
    }

    fn ready_key(&self) -> String {
        format!("{}:ready", self.config.name)
    }

    fn active_key(&self) -> String {
        format!("{}:active", self.config.name)
    }

    /// Write the record. Finished records expire after the retention period.
    async fn save(&self, job: &mut Job) -> Result<()> {
        job.updated_at = Utc::now();
        let raw = serde_json::to_string(job).context("failed to serialize job")?;
        let key = self.job_key(&job.id);
        match self.config.retention {
            Some(ttl) if job.state.is_terminal() => self.store.set_ex(&key, &raw, ttl).await,
            _ => self.store.set(&key, &raw).await,
        }
    }

    async fn require(&self, job_id: &str) -> Result<Job> {
        self.find(job_id)
            .await?
            .ok_or_else(|| anyhow!("job {} not found", job_id))
    }

    /// Enqueue a job under a caller-chosen id.
    ///
    /// An id that already exists yields [`EnqueueResult::Duplicate`] and is
    /// not queued a second time.
    pub async fn enqueue<T: Serialize>(&self, job_id: &str, data: &T) -> Result<EnqueueResult> {
        let data = serde_json::to_value(data).context("failed to serialize job payload")?;
        let job = Job::new(job_id, data, self.config.max_attempts);
        let raw = serde_json::to_string(&job).context("failed to serialize job")?;

        if !self.store.set_nx(&self.job_key(job_id), &raw).await? {
            info!(job_id, "job already enqueued");
            return Ok(EnqueueResult::Duplicate(job_id.to_string()));
        }

        self.store.push_back(&self.ready_key(), job_id).await?;
        info!(job_id, queue = %self.config.name, "job enqueued");
        Ok(EnqueueResult::Created(job_id.to_string()))
    }

    pub async fn find(&self, job_id: &str) -> Result<Option<Job>> {
        let Some(raw) = self.store.get(&self.job_key(job_id)).await? else {
            return Ok(None);
        };
        let job = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt job record for {}", job_id))?;
        Ok(Some(job))
    }

    /// Claim the oldest job that is ready to run.
    ///
    /// The id moves from the ready list to the active list in one step, so a
    /// failure afterwards leaves it where [`JobQueue::recover_stalled`] finds
    /// it. Jobs still waiting out a retry backoff are rotated to the back of
    /// the ready list.
    pub async fn claim(&self) -> Result<Option<ClaimedJob>> {
        let ready = self.ready_key();
        let active = self.active_key();
        let pending = self.store.list_len(&ready).await?;
        let now = Utc::now();

        for _ in 0..pending {
            let Some(id) = self.store.move_front_to_back(&ready, &active).await? else {
                break;
            };
            let Some(mut job) = self.find(&id).await? else {
                warn!(job_id = %id, "dropping ready entry without a job record");
                self.store.list_remove(&active, &id).await?;
                continue;
            };
            if job.state != JobState::Queued {
                warn!(job_id = %id, state = %job.state, "dropping ready entry for job that is not queued");
                self.store.list_remove(&active, &id).await?;
                continue;
            }
            if !job.is_ready(now) {
                self.store.push_back(&ready, &id).await?;
                self.store.list_remove(&active, &id).await?;
                continue;
            }

            job.state = JobState::Running;
            job.attempt += 1;
            job.claimed_at = Some(now);
            job.run_at = None;
            job.progress = JobProgress {
                state: JobState::Running.to_string(),
                progress: 0.0,
                message: None,
            };
            self.save(&mut job).await?;

            return Ok(Some(ClaimedJob { id, job }));
        }

        Ok(None)
    }

    /// Replace the job payload.
    pub async fn update_data<T: Serialize>(&self, job_id: &str, data: &T) -> Result<()> {
        let mut job = self.require(job_id).await?;
        job.data = serde_json::to_value(data).context("failed to serialize job payload")?;
        self.save(&mut job).await
    }

    pub async fn update_progress(&self, job_id: &str, progress: JobProgress) -> Result<()> {
        let mut job = self.require(job_id).await?;
        job.progress = progress;
        self.save(&mut job).await
    }

    pub async fn mark_succeeded(&self, job_id: &str, result: serde_json::Value) -> Result<()> {
        let mut job = self.require(job_id).await?;
        job.state = JobState::Succeeded;
        job.result = Some(result);
        job.error_message = None;
        job.error_kind = None;
        job.progress = JobProgress {
            state: JobState::Succeeded.to_string(),
            progress: 1.0,
            message: None,
        };
        self.save(&mut job).await?;
        self.store.list_remove(&self.active_key(), job_id).await?;
        Ok(())
    }

    /// Record a failure. Retryable failures with attempts left are requeued
    /// with exponential backoff; exhausted ones are dead-lettered.
    ///
    /// The record is written before any list changes, so a failed write
    /// leaves the job `running` and tracked as active.
    pub async fn mark_failed(
        &self,
        job_id: &str,
        error: &str,
        kind: ErrorKind,
    ) -> Result<FailOutcome> {
        let mut job = self.require(job_id).await?;
        let active = self.active_key();

        let now = Utc::now();
        job.error_message = Some(error.to_string());
        job.error_kind = Some(kind);
        job.claimed_at = None;

        if kind.should_retry() && job.has_attempts_left() {
            let delay = backoff_delay(self.config.backoff, job.attempt);
            job.state = JobState::Queued;
            job.run_at = Some(now + chrono::Duration::from_std(delay)?);
            job.progress = JobProgress {
                state: JobState::Queued.to_string(),
                progress: 0.0,
                message: Some(format!("Retrying after error: {}", error)),
            };
            self.save(&mut job).await?;
            self.store.push_back(&self.ready_key(), job_id).await?;
            self.store.list_remove(&active, job_id).await?;
            return Ok(FailOutcome::Retrying {
                attempt: job.attempt,
                delay,
            });
        }

        job.state = JobState::Failed;
        job.progress.state = JobState::Failed.to_string();
        job.progress.message = Some(error.to_string());

        if !kind.should_retry() {
            self.save(&mut job).await?;
            self.store.list_remove(&active, job_id).await?;
            return Ok(FailOutcome::Failed);
        }

        job.dead_lettered_at = Some(now);
        self.save(&mut job).await?;
        self.store.list_remove(&active, job_id).await?;

        let raw = serde_json::to_string(&job).context("failed to serialize job")?;
        self.store
            .push_back(&self.config.dead_letter_name, &raw)
            .await?;
        self.prune_dead_letters(now).await?;
        warn!(job_id, attempts = job.attempt, "job moved to dead letter queue");
        Ok(FailOutcome::DeadLettered)
    }

    /// Drop dead letters older than the retention period.
    async fn prune_dead_letters(&self, now: DateTime<Utc>) -> Result<()> {
        let Some(retention) = self.config.retention else {
            return Ok(());
        };
        let cutoff = now - chrono::Duration::from_std(retention)?;
        let list = &self.config.dead_letter_name;

        for raw in self.store.list_range(list).await? {
            let expired = serde_json::from_str::<Job>(&raw)
                .ok()
                .and_then(|job| job.dead_lettered_at)
                .is_some_and(|at| at < cutoff);
            if expired {
                self.store.list_remove(list, &raw).await?;
            }
        }
        Ok(())
    }

    /// Put unfinished records back under list tracking. `queued` jobs missing
    /// from the ready list are requeued. `running` jobs not yet in `running`
    /// are pushed onto the active list and appended to `running`.
    async fn reconcile_orphans(&self, running: &mut Vec<Job>) -> Result<()> {
        let prefix = self.job_prefix();
        let ready_key = self.ready_key();
        let ready: HashSet<String> = self.store.list_range(&ready_key).await?.into_iter().collect();

        for key in self.store.keys_with_prefix(&prefix).await? {
            let Some(id) = key.strip_prefix(&prefix) else {
                continue;
            };
            let job = match self.find(id).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    warn!(job_id = %id, error = %e, "skipping unreadable job record");
                    continue;
                }
            };

            match job.state {
                JobState::Queued if !ready.contains(id) => {
                    self.store.push_back(&ready_key, id).await?;
                    warn!(job_id = %id, "requeued job missing from the ready list");
                }
                JobState::Running if !running.iter().any(|r| r.id == id) => {
                    self.store.push_back(&self.active_key(), id).await?;
                    warn!(job_id = %id, "tracking running job missing from the active list");
                    running.push(job);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Repair list tracking, then force jobs stuck in `running` longer than
    /// `timeout` to `failed`.
    ///
    /// Returns the ids that were failed.
    pub async fn recover_stalled(&self, timeout: Duration) -> Result<Vec<String>> {
        let active = self.active_key();
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(timeout)?;

        let mut running: Vec<Job> = Vec::new();
        for id in self.store.list_range(&active).await? {
            match self.find(&id).await {
                Ok(Some(job)) if job.state == JobState::Running => {
                    if !running.iter().any(|r| r.id == id) {
                        running.push(job);
                    }
                }
                Ok(_) => {
                    self.store.list_remove(&active, &id).await?;
                }
                Err(e) => warn!(job_id = %id, error = %e, "skipping unreadable active job"),
            }
        }

        self.reconcile_orphans(&mut running).await?;

        let mut recovered = Vec::new();
        for mut job in running {
            let stalled = job.claimed_at.map_or(true, |at| at + timeout <= now);
            if !stalled {
                continue;
            }

            let message = "Job exceeded timeout while running".to_string();
            job.state = JobState::Failed;
            job.error_kind = Some(ErrorKind::NonRetryable);
            job.error_message = Some(message.clone());
            job.progress.state = JobState::Failed.to_string();
            job.progress.message = Some(message);
            self.save(&mut job).await?;
            self.store.list_remove(&active, &job.id).await?;

            warn!(job_id = %job.id, "failed stalled job");
            recovered.push(job.id);
        }

        Ok(recovered)
    }

    /// Dead-lettered job records, oldest first.
    pub async fn dead_letters(&self) -> Result<Vec<Job>> {
        self.store
            .list_range(&self.config.dead_letter_name)
            .await?
            .iter()
            .map(|raw| serde_json::from_str(raw).context("corrupt dead letter entry"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::kv::MemoryStore;
    use crate::kernel::test_dependencies::FlakyStore;
    use serde_json::json;

    fn queue_with(max_attempts: u32, backoff: Duration) -> (Arc<MemoryStore>, JobQueue) {
        let store = Arc::new(MemoryStore::new());
        let config = QueueConfig {
            max_attempts,
            backoff,
            ..QueueConfig::new("test")
        };
        (store.clone(), JobQueue::new(store, config))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(20));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn duplicate_ids_are_not_requeued() {
        let (store, queue) = queue_with(3, Duration::ZERO);

        let first = queue.enqueue("job_1", &json!({"n": 1})).await.unwrap();
        let second = queue.enqueue("job_1", &json!({"n": 2})).await.unwrap();

        assert!(first.is_created());
        assert_eq!(second, EnqueueResult::Duplicate("job_1".to_string()));
        assert_eq!(store.list_len("test:ready").await.unwrap(), 1);

        let job = queue.find("job_1").await.unwrap().unwrap();
        assert_eq!(job.data["n"], 1);

        assert!(queue.claim().await.unwrap().is_some());
        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_is_fifo_and_marks_running() {
        let (_, queue) = queue_with(3, Duration::ZERO);
        queue.enqueue("a", &json!({})).await.unwrap();
        queue.enqueue("b", &json!({})).await.unwrap();

        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(claimed.id, "a");
        assert_eq!(claimed.attempt(), 1);

        let stored = queue.find("a").await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Running);
        assert!(stored.claimed_at.is_some());

        assert_eq!(queue.claim().await.unwrap().unwrap().id, "b");
    }

    #[tokio::test]
    async fn retryable_failure_requeues_then_dead_letters() {
        let (_, queue) = queue_with(2, Duration::ZERO);
        queue.enqueue("job_1", &json!({"k": "v"})).await.unwrap();

        queue.claim().await.unwrap().unwrap();
        let outcome = queue
            .mark_failed("job_1", "store unavailable", ErrorKind::Retryable)
            .await
            .unwrap();
        assert!(matches!(outcome, FailOutcome::Retrying { attempt: 1, .. }));
        assert_eq!(queue.find("job_1").await.unwrap().unwrap().state, JobState::Queued);

        let again = queue.claim().await.unwrap().unwrap();
        assert_eq!(again.attempt(), 2);
        let outcome = queue
            .mark_failed("job_1", "store unavailable", ErrorKind::Retryable)
            .await
            .unwrap();
        assert_eq!(outcome, FailOutcome::DeadLettered);

        let job = queue.find("job_1").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.dead_lettered_at.is_some());

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].data["k"], "v");
    }

    #[tokio::test]
    async fn non_retryable_failure_is_final() {
        let (_, queue) = queue_with(3, Duration::ZERO);
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();

        let outcome = queue
            .mark_failed("job_1", "Crawler timed out", ErrorKind::NonRetryable)
            .await
            .unwrap();
        assert_eq!(outcome, FailOutcome::Failed);
        assert!(queue.dead_letters().await.unwrap().is_empty());
        assert!(queue.claim().await.unwrap().is_none());

        let job = queue.find("job_1").await.unwrap().unwrap();
        assert_eq!(job.error_message.as_deref(), Some("Crawler timed out"));
    }

    #[tokio::test]
    async fn backoff_delays_next_claim() {
        let (_, queue) = queue_with(3, Duration::from_secs(60));
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();
        queue
            .mark_failed("job_1", "boom", ErrorKind::Retryable)
            .await
            .unwrap();

        assert!(queue.claim().await.unwrap().is_none());
        assert!(queue.find("job_1").await.unwrap().unwrap().run_at.is_some());
    }

    #[tokio::test]
    async fn success_stores_result() {
        let (store, queue) = queue_with(3, Duration::ZERO);
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();
        queue
            .mark_succeeded("job_1", json!({"count": 3}))
            .await
            .unwrap();

        let job = queue.find("job_1").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.progress.progress, 1.0);
        assert_eq!(job.result.unwrap()["count"], 3);
        assert_eq!(store.list_len("test:active").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stalled_running_jobs_are_failed() {
        let (_, queue) = queue_with(3, Duration::ZERO);
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();

        assert!(queue
            .recover_stalled(Duration::from_secs(3600))
            .await
            .unwrap()
            .is_empty());

        let recovered = queue.recover_stalled(Duration::ZERO).await.unwrap();
        assert_eq!(recovered, vec!["job_1".to_string()]);

        let job = queue.find("job_1").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error_kind, Some(ErrorKind::NonRetryable));
    }

    #[tokio::test]
    async fn payload_updates_persist() {
        let (_, queue) = queue_with(3, Duration::ZERO);
        queue.enqueue("job_1", &json!({"paths": []})).await.unwrap();
        queue
            .update_data("job_1", &json!({"paths": ["a.json"]}))
            .await
            .unwrap();
        let claimed = queue.claim().await.unwrap().unwrap();
        let data: serde_json::Value = claimed.deserialize().unwrap();
        assert_eq!(data["paths"][0], "a.json");
    }

    #[tokio::test]
    async fn interrupted_claim_is_requeued_by_recovery() {
        let store = Arc::new(FlakyStore::new());
        let queue = JobQueue::new(
            store.clone(),
            QueueConfig {
                backoff: Duration::ZERO,
                ..QueueConfig::new("test")
            },
        );
        queue.enqueue("job_1", &json!({})).await.unwrap();

        store.fail_nth_write(1);
        assert!(queue.claim().await.is_err());
        assert_eq!(store.list_range("test:active").await.unwrap(), vec!["job_1"]);

        assert!(queue.claim().await.unwrap().is_none());
        assert_eq!(queue.find("job_1").await.unwrap().unwrap().state, JobState::Queued);

        let recovered = queue.recover_stalled(Duration::from_secs(3600)).await.unwrap();
        assert!(recovered.is_empty());
        assert!(store.list_range("test:active").await.unwrap().is_empty());

        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(claimed.id, "job_1");
        assert_eq!(claimed.attempt(), 1);
    }

    #[tokio::test]
    async fn interrupted_failure_stays_recoverable() {
        let store = Arc::new(FlakyStore::new());
        let queue = JobQueue::new(store.clone(), QueueConfig::new("test"));
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();

        store.fail_nth_write(1);
        assert!(queue
            .mark_failed("job_1", "Crawler timed out", ErrorKind::NonRetryable)
            .await
            .is_err());
        assert_eq!(queue.find("job_1").await.unwrap().unwrap().state, JobState::Running);

        let recovered = queue.recover_stalled(Duration::ZERO).await.unwrap();
        assert_eq!(recovered, vec!["job_1".to_string()]);
        assert_eq!(queue.find("job_1").await.unwrap().unwrap().state, JobState::Failed);
    }

    #[tokio::test]
    async fn interrupted_success_stays_tracked() {
        let store = Arc::new(FlakyStore::new());
        let queue = JobQueue::new(store.clone(), QueueConfig::new("test"));
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();

        store.fail_nth_write(1);
        assert!(queue.mark_succeeded("job_1", json!({})).await.is_err());
        assert_eq!(store.list_range("test:active").await.unwrap(), vec!["job_1"]);

        queue.mark_succeeded("job_1", json!({})).await.unwrap();
        assert!(store.list_range("test:active").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn running_record_missing_from_active_list_is_recovered() {
        let (store, queue) = queue_with(3, Duration::ZERO);
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();
        store.list_remove("test:active", "job_1").await.unwrap();

        assert!(queue
            .recover_stalled(Duration::from_secs(3600))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_range("test:active").await.unwrap(), vec!["job_1"]);

        let recovered = queue.recover_stalled(Duration::ZERO).await.unwrap();
        assert_eq!(recovered, vec!["job_1".to_string()]);
        assert!(store.list_range("test:active").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finished_records_expire_after_retention() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(
            store,
            QueueConfig {
                retention: Some(Duration::from_millis(20)),
                ..QueueConfig::new("test")
            },
        );
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();
        queue.mark_succeeded("job_1", json!({})).await.unwrap();
        assert!(queue.find("job_1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(queue.find("job_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unfinished_records_do_not_expire() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(
            store,
            QueueConfig {
                retention: Some(Duration::from_millis(20)),
                ..QueueConfig::new("test")
            },
        );
        queue.enqueue("job_1", &json!({})).await.unwrap();
        queue.claim().await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(queue.find("job_1").await.unwrap().unwrap().state, JobState::Running);
    }

    #[tokio::test]
    async fn old_dead_letters_are_trimmed() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(
            store,
            QueueConfig {
                max_attempts: 1,
                backoff: Duration::ZERO,
                retention: Some(Duration::from_millis(20)),
                ..QueueConfig::new("test")
            },
        );

        for id in ["job_1", "job_2"] {
            queue.enqueue(id, &json!({})).await.unwrap();
            queue.claim().await.unwrap().unwrap();
            let outcome = queue.mark_failed(id, "boom", ErrorKind::Retryable).await.unwrap();
            assert_eq!(outcome, FailOutcome::DeadLettered);
            tokio::time::sleep(Duration::from_millis(40)).await;
        }

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, "job_2");
    }
}
