//! Materials facade: the only entry point the request layer uses.
//!
//! `search` answers from the cache when it can and otherwise queues a crawl
//! without waiting for it. Crawl failures show up as `failed` job states,
//! never as errors; only store failures are returned as `Err`.

use std::sync::Arc;

use anyhow::{bail, Result};
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MaterialsConfig;
use crate::domains::materials::cache::{build_fingerprint, is_preferred_result_path, MaterialsCache};
use crate::domains::materials::events::{EventPayload, MaterialsEvent, MaterialsEvents};
use crate::domains::materials::models::{
    JobResultView, JobStatusView, MaterialsJobData, MaterialsJobResult, SearchQuery,
    SearchResponse,
};
use crate::domains::materials::payload::{is_comment_payload, rewrite_local_paths};
use crate::kernel::jobs::{EnqueueResult, JobQueue, JobState};
use crate::kernel::{BaseMediaCrawler, ServerDeps};

pub struct MaterialsService {
    queue: Arc<JobQueue>,
    crawler: Arc<dyn BaseMediaCrawler>,
    cache: MaterialsCache,
    events: MaterialsEvents,
    config: MaterialsConfig,
}

impl MaterialsService {
    pub fn new(deps: &ServerDeps, queue: Arc<JobQueue>) -> Self {
        Self {
            queue,
            crawler: deps.crawler.clone(),
            cache: MaterialsCache::new(deps.store.clone(), deps.materials.cache_ttl),
            events: deps.events.clone(),
            config: deps.materials.clone(),
        }
    }

    fn rewrite(&self, value: &Value) -> Value {
        rewrite_local_paths(value, &self.config.backend_url)
    }

    /// Serve a search from the cache, or queue a crawl for it.
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse> {
        if query.keywords.trim().is_empty() {
            bail!("keywords is required");
        }

        let fingerprint = build_fingerprint(&query.org_id, query.platform, &query.keywords);

        if !query.force_crawl {
            if let Some(response) = self.search_cache(&fingerprint).await? {
                return Ok(response);
            }
        }

        let job_id = format!("job_{}", Uuid::new_v4());
        let data = MaterialsJobData {
            org_id: query.org_id,
            platform: query.platform,
            keywords: query.keywords,
            start_page: query.start_page,
            page_limit: query.page_limit,
            query_hash: Some(fingerprint),
            started_at: None,
            consumed_paths: Vec::new(),
        };
        self.enqueue(&job_id, &data).await?;

        Ok(SearchResponse {
            job_id: Some(job_id),
            state: JobState::Queued,
            cached_results: Value::Array(Vec::new()),
            cached_at: None,
            result_path: None,
            count: None,
            preview: None,
            cache_hit: false,
        })
    }

    /// A cache hit whose file still holds content, or `None`. Stale entries
    /// are cleared.
    async fn search_cache(&self, fingerprint: &str) -> Result<Option<SearchResponse>> {
        let Some(cached) = self.cache.get(fingerprint).await? else {
            return Ok(None);
        };

        if !is_preferred_result_path(&cached.result_path) {
            info!(path = %cached.result_path, "clearing cache entry for ineligible file");
            self.cache.clear(fingerprint).await?;
            return Ok(None);
        }

        let results = match self
            .crawler
            .read_file(&cached.result_path, true, self.config.result_limit)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(path = %cached.result_path, error = %e, "cached file unreadable, crawling again");
                return Ok(None);
            }
        };

        if is_comment_payload(&results) {
            info!(path = %cached.result_path, "clearing cache entry holding comments");
            self.cache.clear(fingerprint).await?;
            return Ok(None);
        }

        debug!(path = %cached.result_path, "serving materials search from cache");
        Ok(Some(SearchResponse {
            job_id: None,
            state: JobState::Succeeded,
            cached_results: self.rewrite(&results),
            cached_at: Some(cached.cached_at),
            result_path: Some(cached.result_path),
            count: cached.count,
            preview: cached.preview.as_ref().map(|p| self.rewrite(p)),
            cache_hit: true,
        }))
    }

    /// Queue a crawl under `job_id` and announce it. Re-using an id does not
    /// queue a second crawl.
    pub async fn enqueue(&self, job_id: &str, data: &MaterialsJobData) -> Result<EnqueueResult> {
        let result = self.queue.enqueue(job_id, data).await?;
        if result.is_created() {
            self.events
                .publish(
                    job_id,
                    EventPayload::status(
                        JobState::Queued.as_str(),
                        0.0,
                        Some("Queued for crawling".to_string()),
                    ),
                )
                .await;
        }
        Ok(result)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<Option<JobStatusView>> {
        let Some(job) = self.queue.find(job_id).await? else {
            return Ok(None);
        };
        Ok(Some(JobStatusView {
            job_id: job.id.clone(),
            state: job.visible_state(),
            progress: job.progress.progress,
            message: job.progress.message.clone(),
            error: job.error_message.clone(),
        }))
    }

    /// Result of a job. `data` holds the output file, read only once the job
    /// has succeeded.
    pub async fn job_result(&self, job_id: &str) -> Result<Option<JobResultView>> {
        let Some(job) = self.queue.find(job_id).await? else {
            return Ok(None);
        };

        let state = job.visible_state();
        let mut view = JobResultView {
            job_id: job.id.clone(),
            state,
            result_path: None,
            count: None,
            preview: None,
            data: None,
        };
        if state != JobState::Succeeded {
            return Ok(Some(view));
        }

        let result: MaterialsJobResult = match job.result {
            Some(result) => serde_json::from_value(result)?,
            None => return Ok(Some(view)),
        };
        let Some(path) = result.result_path else {
            return Ok(Some(view));
        };

        view.data = match self
            .crawler
            .read_file(&path, true, self.config.result_limit)
            .await
        {
            Ok(data) => Some(self.rewrite(&data)),
            Err(e) => {
                warn!(job_id, path = %path, error = %e, "failed to read job output file");
                None
            }
        };
        view.preview = result.preview.as_ref().map(|p| self.rewrite(p));
        view.count = result.count;
        view.result_path = Some(path);
        Ok(Some(view))
    }

    /// Live events of a job, ending with its terminal event. A job that has
    /// already finished yields just its terminal event.
    pub async fn subscribe(&self, job_id: &str) -> BoxStream<'static, MaterialsEvent> {
        // Subscribe before reading the record so a job finishing in between
        // is still seen.
        let live = self.events.subscribe(job_id).await;

        let job = match self.queue.find(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return live,
            Err(e) => {
                warn!(job_id, error = %e, "failed to read job for subscription");
                return live;
            }
        };

        let payload = match job.visible_state() {
            JobState::Succeeded => EventPayload::status(JobState::Succeeded.as_str(), 1.0, None),
            JobState::Failed => EventPayload::Error {
                state: JobState::Failed.as_str().to_string(),
                message: job.error_message.unwrap_or_default(),
            },
            _ => return live,
        };

        debug!(job_id, "job already finished, replaying terminal event");
        stream::once(future::ready(MaterialsEvent {
            job_id: Some(job_id.to_string()),
            payload,
        }))
        .boxed()
    }
}
