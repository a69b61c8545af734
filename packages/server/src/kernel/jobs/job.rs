//! Job record stored in the key-value store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle of a queued job. `Succeeded` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }
}

/// Latest progress report written by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobProgress {
    /// Sub-state reported to clients, e.g. `running` or `login_required`.
    pub state: String,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Job Model
// ============================================================================

/// A queued unit of work with an opaque JSON payload.
///
/// The queue owns the record; only the worker processing the job mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub data: serde_json::Value,
    pub state: JobState,
    #[serde(default)]
    pub progress: JobProgress,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,

    /// Attempts started so far, including the current one.
    #[serde(default)]
    pub attempt: u32,
    pub max_attempts: u32,
    /// Earliest time the job may be claimed (retry backoff).
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dead_lettered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>, data: serde_json::Value, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data,
            state: JobState::Queued,
            progress: JobProgress {
                state: JobState::Queued.to_string(),
                progress: 0.0,
                message: None,
            },
            result: None,
            error_message: None,
            error_kind: None,
            attempt: 0,
            max_attempts: max_attempts.max(1),
            run_at: None,
            claimed_at: None,
            dead_lettered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the job may be claimed at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Queued && self.run_at.map_or(true, |at| at <= now)
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// State as shown to callers: a running job that already reported full
    /// progress is presented as succeeded.
    pub fn visible_state(&self) -> JobState {
        match self.state {
            JobState::Running if self.progress.progress >= 1.0 => JobState::Succeeded,
            state => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_job_is_queued_and_ready() {
        let job = Job::new("job_1", serde_json::json!({}), 3);
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempt, 0);
        assert!(job.is_ready(Utc::now()));
        assert!(job.has_attempts_left());
    }

    #[test]
    fn backoff_delays_readiness() {
        let mut job = Job::new("job_1", serde_json::json!({}), 3);
        let now = Utc::now();
        job.run_at = Some(now + Duration::seconds(5));
        assert!(!job.is_ready(now));
        assert!(job.is_ready(now + Duration::seconds(6)));
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        let job = Job::new("job_1", serde_json::json!({}), 0);
        assert_eq!(job.max_attempts, 1);
    }

    #[test]
    fn full_progress_reads_as_succeeded() {
        let mut job = Job::new("job_1", serde_json::json!({}), 3);
        job.state = JobState::Running;
        job.progress.progress = 0.5;
        assert_eq!(job.visible_state(), JobState::Running);
        job.progress.progress = 1.0;
        assert_eq!(job.visible_state(), JobState::Succeeded);
    }

    #[test]
    fn states_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&JobState::Succeeded).unwrap(), "\"succeeded\"");
        assert_eq!(
            serde_json::to_string(&ErrorKind::NonRetryable).unwrap(),
            "\"non_retryable\""
        );
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }
}
