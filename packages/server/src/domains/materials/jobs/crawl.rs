//! Crawl job handler.
//!
//! Drives one crawl on the external crawler from start to a resolved output
//! file:
//!
//! ```text
//! check login ─► start crawl ─► poll status + relay logs ─► resolve output
//!                                   (until idle, error, or timeout)   │
//!                                                                     ▼
//!                                          content check ─► result event ─► cache
//! ```
//!
//! The worker runs one job at a time, so the crawler session is never shared.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediacrawler_client::{
    CrawlerState, CrawlerType, LoginType, Platform, SaveOption, StartCrawlRequest,
    DEFAULT_LOG_LIMIT,
};
use tracing::{debug, info, warn};

use super::resolve::{resolve_output_for_job, ResolvedOutput};
use crate::config::MaterialsConfig;
use crate::domains::materials::cache::{build_fingerprint, MaterialsCache};
use crate::domains::materials::error::CrawlError;
use crate::domains::materials::events::{EventPayload, MaterialsEvents};
use crate::domains::materials::log_parser::{extract_qr_code, is_login_success};
use crate::domains::materials::models::{MaterialsJobData, MaterialsJobResult};
use crate::domains::materials::payload::{is_non_content_payload, summarize};
use crate::kernel::jobs::{
    ClaimedJob, FailOutcome, JobError, JobHandler, JobProgress, JobQueue, JobState,
};
use crate::kernel::{BaseMediaCrawler, ServerDeps};

pub struct CrawlJobHandler {
    queue: Arc<JobQueue>,
    crawler: Arc<dyn BaseMediaCrawler>,
    cache: MaterialsCache,
    events: MaterialsEvents,
    config: MaterialsConfig,
}

impl CrawlJobHandler {
    pub fn new(deps: &ServerDeps, queue: Arc<JobQueue>) -> Self {
        Self {
            queue,
            crawler: deps.crawler.clone(),
            cache: MaterialsCache::new(deps.store.clone(), deps.materials.cache_ttl),
            events: deps.events.clone(),
            config: deps.materials.clone(),
        }
    }

    /// Persist progress and publish it as a status event.
    async fn report(
        &self,
        job_id: &str,
        state: &str,
        progress: f64,
        message: Option<String>,
    ) -> Result<(), JobError> {
        self.queue
            .update_progress(
                job_id,
                JobProgress {
                    state: state.to_string(),
                    progress,
                    message: message.clone(),
                },
            )
            .await?;
        self.events
            .publish(job_id, EventPayload::status(state, progress, message))
            .await;
        Ok(())
    }

    async fn start_crawl(&self, job_id: &str, data: &MaterialsJobData) -> Result<(), JobError> {
        self.report(job_id, "running", 0.05, Some("Checking login status...".into()))
            .await?;

        let login = self.crawler.check_login_status(data.platform).await;
        let headless = login.has_valid_login;
        info!(
            job_id,
            platform = %data.platform,
            has_valid_login = login.has_valid_login,
            recommendation = ?login.recommendation,
            "login status checked"
        );

        let message = if headless {
            "Valid login found, using headless mode"
        } else {
            "No valid login, browser window will open for QR code login"
        };
        self.report(job_id, "running", 0.1, Some(message.into())).await?;

        let request = StartCrawlRequest {
            platform: data.platform,
            crawler_type: CrawlerType::Search,
            keywords: Some(data.keywords.clone()),
            client_job_id: (!job_id.is_empty()).then(|| job_id.to_string()),
            login_type: Some(LoginType::Qrcode),
            save_option: Some(SaveOption::Json),
            start_page: Some(data.start_page),
            crawl_count: Some(self.config.crawl_count(data.platform, data.page_limit)),
            headless: Some(headless),
        };
        self.crawler
            .start_crawl(&request)
            .await
            .map_err(CrawlError::Adapter)?;

        info!(job_id, platform = %data.platform, keywords = %data.keywords, "crawl started");
        Ok(())
    }

    /// Best-effort stop of an abandoned crawl.
    async fn stop_crawler(&self, job_id: &str) {
        if let Err(e) = self.crawler.stop_crawl().await {
            warn!(job_id, error = %e, "failed to stop crawler");
        }
    }

    /// Poll until the crawler goes idle after having run. States the client
    /// does not recognize keep the job waiting.
    async fn monitor(&self, job_id: &str, platform: Platform) -> Result<(), JobError> {
        let mut log_cursor = 0;
        let mut saw_running = false;

        loop {
            let status = self
                .crawler
                .get_status()
                .await
                .map_err(CrawlError::Adapter)?;
            debug!(job_id, status = ?status.status, "crawler status");

            let finished = match status.status {
                CrawlerState::Running => {
                    saw_running = true;
                    self.report(job_id, "running", 0.5, status.error_message.clone())
                        .await?;
                    false
                }
                CrawlerState::Stopping => {
                    self.report(job_id, "stopping", 0.9, status.error_message.clone())
                        .await?;
                    false
                }
                CrawlerState::Idle if !saw_running => {
                    self.report(job_id, "running", 0.1, Some("Waiting for crawler to start".into()))
                        .await?;
                    false
                }
                CrawlerState::Idle => {
                    self.report(job_id, "stopping", 0.9, Some("Resolving results".into()))
                        .await?;
                    true
                }
                CrawlerState::Error | CrawlerState::Unknown => false,
            };

            log_cursor = self.relay_logs(job_id, platform, log_cursor).await?;

            if status.status == CrawlerState::Error {
                let message = status
                    .error_message
                    .unwrap_or_else(|| "Crawler failed".to_string());
                return Err(CrawlError::CrawlerFailed(message).into());
            }
            if finished {
                return Ok(());
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Relay log lines newer than `cursor`. Returns the new cursor.
    async fn relay_logs(
        &self,
        job_id: &str,
        platform: Platform,
        cursor: u64,
    ) -> Result<u64, JobError> {
        if !self.config.logs_forwarding || job_id.is_empty() {
            return Ok(cursor);
        }

        let logs = self
            .crawler
            .get_logs(DEFAULT_LOG_LIMIT)
            .await
            .map_err(CrawlError::Adapter)?;

        let mut next = cursor;
        for log in logs.into_iter().filter(|log| log.id > cursor) {
            next = log.id;
            if log.client_job_id.as_deref().is_some_and(|owner| owner != job_id) {
                continue;
            }

            if let Some(image) = extract_qr_code(&log.message) {
                info!(job_id, platform = %platform, "login QR code received");
                self.events
                    .publish(
                        job_id,
                        EventPayload::LoginQrcode {
                            platform,
                            base64_image: image.to_string(),
                            message: "Scan the QR code to continue".to_string(),
                        },
                    )
                    .await;
                self.report(job_id, "login_required", 0.2, Some("Login required".into()))
                    .await?;
                continue;
            }

            if is_login_success(&log.message) {
                info!(job_id, platform = %platform, "login succeeded");
                self.events
                    .publish(job_id, EventPayload::LoginSuccess { platform })
                    .await;
            }

            self.events
                .publish(
                    job_id,
                    EventPayload::Log {
                        level: log.level,
                        message: log.message,
                        timestamp: log.timestamp,
                    },
                )
                .await;
        }

        Ok(next)
    }

    async fn resolve(
        &self,
        job_id: &str,
        data: &MaterialsJobData,
        started_at: DateTime<Utc>,
    ) -> Result<Option<ResolvedOutput>, JobError> {
        let resolved = resolve_output_for_job(
            self.crawler.as_ref(),
            job_id,
            data.platform,
            started_at,
            &data.consumed_set(),
            self.config.result_limit,
        )
        .await
        .map_err(CrawlError::Adapter)?;
        Ok(resolved)
    }

    /// Resolve the output file, skipping one non-content file if needed.
    async fn resolve_content(
        &self,
        job_id: &str,
        data: &mut MaterialsJobData,
        started_at: DateTime<Utc>,
    ) -> Result<ResolvedOutput, JobError> {
        let resolved = self
            .resolve(job_id, data, started_at)
            .await?
            .ok_or(CrawlError::NoOutput)?;

        if !is_non_content_payload(&resolved.data, data.platform) {
            return Ok(resolved);
        }

        warn!(job_id, path = %resolved.file.path, "output file is not content, trying another");
        data.consume(&resolved.file.path);
        self.queue.update_data(job_id, data).await?;

        let retried = self
            .resolve(job_id, data, started_at)
            .await?
            .ok_or(CrawlError::NoContentOutput)?;
        if is_non_content_payload(&retried.data, data.platform) {
            return Err(CrawlError::NonContentOutput.into());
        }
        Ok(retried)
    }

    async fn store_in_cache(&self, data: &MaterialsJobData, result: &MaterialsJobResult) {
        let Some(path) = result.result_path.as_deref() else {
            return;
        };
        let fingerprint = data
            .query_hash
            .clone()
            .unwrap_or_else(|| build_fingerprint(&data.org_id, data.platform, &data.keywords));

        match self
            .cache
            .set(&fingerprint, path, result.count, result.preview.clone())
            .await
        {
            Ok(true) => debug!(fingerprint = %fingerprint, path, "materials result cached"),
            Ok(false) => debug!(fingerprint = %fingerprint, path, "materials result not eligible for cache"),
            Err(e) => warn!(fingerprint = %fingerprint, error = %e, "failed to store materials cache entry"),
        }
    }
}

#[async_trait]
impl JobHandler for CrawlJobHandler {
    /// Stop a crawl left running by a previous process.
    async fn on_startup(&self) -> anyhow::Result<()> {
        match self.crawler.get_status().await {
            Ok(status) if status.status.is_busy() => {
                warn!(status = ?status.status, "detected running crawler on startup, sending stop");
                if let Err(e) = self.crawler.stop_crawl().await {
                    warn!(error = %e, "failed to stop crawler on startup");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "unable to check crawler status on startup"),
        }
        Ok(())
    }

    async fn execute(&self, job: &ClaimedJob) -> Result<serde_json::Value, JobError> {
        let job_id = job.id.as_str();
        let mut data: MaterialsJobData = job.deserialize().map_err(JobError::non_retryable)?;

        let started_at = Utc::now();
        data.started_at = Some(started_at);
        self.queue.update_data(job_id, &data).await?;

        self.start_crawl(job_id, &data).await?;

        match tokio::time::timeout(self.config.job_timeout, self.monitor(job_id, data.platform)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                // A crawler that reported an error has already stopped itself.
                let crawler_failed = matches!(
                    e.source.downcast_ref::<CrawlError>(),
                    Some(CrawlError::CrawlerFailed(_))
                );
                if !crawler_failed {
                    warn!(job_id, error = %e, "crawl monitoring failed, stopping crawler");
                    self.stop_crawler(job_id).await;
                }
                return Err(e);
            }
            Err(_) => {
                warn!(job_id, timeout_secs = self.config.job_timeout.as_secs(), "crawl timed out, stopping crawler");
                self.stop_crawler(job_id).await;
                return Err(CrawlError::Timeout(self.config.job_timeout).into());
            }
        }

        let resolved = self.resolve_content(job_id, &mut data, started_at).await?;
        let summary = summarize(&resolved.data);

        data.consume(&resolved.file.path);
        self.queue.update_data(job_id, &data).await?;

        self.events
            .publish(
                job_id,
                EventPayload::Result {
                    count: summary.count,
                    preview: summary.preview.clone(),
                },
            )
            .await;

        let result = MaterialsJobResult {
            result_path: Some(resolved.file.path.clone()),
            count: Some(summary.count),
            preview: Some(summary.preview),
        };
        self.store_in_cache(&data, &result).await;

        info!(job_id, path = %resolved.file.path, count = summary.count, "crawl resolved");
        Ok(serde_json::to_value(&result).map_err(anyhow::Error::from)?)
    }

    async fn on_succeeded(&self, job: &ClaimedJob, _result: &serde_json::Value) {
        self.events
            .publish(&job.id, EventPayload::status(JobState::Succeeded.as_str(), 1.0, None))
            .await;
    }

    async fn on_failed(&self, job: &ClaimedJob, error: &JobError, outcome: &FailOutcome) {
        let payload = match outcome {
            FailOutcome::Retrying { attempt, delay } => EventPayload::status(
                JobState::Queued.as_str(),
                0.0,
                Some(format!(
                    "Retrying after error: {} (attempt {} failed, next in {}s)",
                    error,
                    attempt,
                    delay.as_secs()
                )),
            ),
            FailOutcome::Failed | FailOutcome::DeadLettered => EventPayload::Error {
                state: JobState::Failed.as_str().to_string(),
                message: error.to_string(),
            },
        };
        self.events.publish(&job.id, payload).await;
    }
}
