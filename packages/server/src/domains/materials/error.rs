use std::time::Duration;

use thiserror::Error;

use crate::kernel::jobs::JobError;

/// Failures of the crawl itself. None of them are retried by the queue; the
/// caller submits a fresh search instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),

    #[error("Crawler timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("No output file found for job")]
    NoOutput,

    #[error("No content output file found for job")]
    NoContentOutput,

    #[error("Non-content output file found for job")]
    NonContentOutput,

    #[error("{0}")]
    CrawlerFailed(String),
}

impl From<CrawlError> for JobError {
    fn from(error: CrawlError) -> Self {
        JobError::non_retryable(error)
    }
}
