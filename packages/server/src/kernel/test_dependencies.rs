// TestDependencies - mock implementations for testing
//
// Provides a scripted crawler and an in-memory store that can be injected
// into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mediacrawler_client::{
    CrawlerState, CrawlerStatus, FileItem, LogEntry, LoginRecommendation, LoginStatus, Platform,
    StartCrawlRequest, StartCrawlResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{BaseMediaCrawler, KeyValueStore, MemoryStore, ServerDeps};
use crate::config::MaterialsConfig;
use crate::domains::materials::MaterialsEvents;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Mock Crawler
// =============================================================================

/// Scripted stand-in for the external crawler.
///
/// Status reports are consumed in order; the last one repeats. Stopping the
/// crawler makes it report `idle`.
pub struct MockCrawler {
    statuses: Arc<Mutex<VecDeque<CrawlerStatus>>>,
    files: Arc<Mutex<Vec<FileItem>>>,
    contents: Arc<Mutex<HashMap<String, serde_json::Value>>>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    login: Arc<Mutex<LoginStatus>>,
    start_error: Arc<Mutex<Option<String>>>,
    start_calls: Arc<Mutex<Vec<StartCrawlRequest>>>,
    stop_calls: Arc<Mutex<usize>>,
    read_calls: Arc<Mutex<Vec<String>>>,
}

impl MockCrawler {
    pub fn new() -> Self {
        Self {
            statuses: Arc::new(Mutex::new(VecDeque::new())),
            files: Arc::new(Mutex::new(Vec::new())),
            contents: Arc::new(Mutex::new(HashMap::new())),
            logs: Arc::new(Mutex::new(Vec::new())),
            login: Arc::new(Mutex::new(LoginStatus::unavailable())),
            start_error: Arc::new(Mutex::new(None)),
            start_calls: Arc::new(Mutex::new(Vec::new())),
            stop_calls: Arc::new(Mutex::new(0)),
            read_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue status reports, returned one per `get_status` call
    pub fn with_statuses(self, states: &[CrawlerState]) -> Self {
        lock(&self.statuses).extend(states.iter().copied().map(CrawlerStatus::new));
        self
    }

    /// Queue an `error` status report carrying `message`
    pub fn with_error_status(self, message: &str) -> Self {
        let mut status = CrawlerStatus::new(CrawlerState::Error);
        status.error_message = Some(message.to_string());
        lock(&self.statuses).push_back(status);
        self
    }

    pub fn with_file(self, file: FileItem) -> Self {
        lock(&self.files).push(file);
        self
    }

    /// Content returned when `path` is read
    pub fn with_content(self, path: &str, content: serde_json::Value) -> Self {
        lock(&self.contents).insert(path.to_string(), content);
        self
    }

    pub fn with_log(self, id: u64, message: &str) -> Self {
        lock(&self.logs).push(log_entry(id, message, None));
        self
    }

    /// Log line tagged with the job that produced it
    pub fn with_job_log(self, id: u64, job_id: &str, message: &str) -> Self {
        lock(&self.logs).push(log_entry(id, message, Some(job_id)));
        self
    }

    /// Report a saved login for every platform
    pub fn with_valid_login(self) -> Self {
        *lock(&self.login) = LoginStatus {
            has_valid_login: true,
            recommendation: LoginRecommendation::Headless,
            message: "Valid login found".to_string(),
            cookies_found: None,
        };
        self
    }

    pub fn failing_start(self, message: &str) -> Self {
        *lock(&self.start_error) = Some(message.to_string());
        self
    }

    /// Get all start requests that were sent
    pub fn start_calls(&self) -> Vec<StartCrawlRequest> {
        lock(&self.start_calls).clone()
    }

    pub fn stop_count(&self) -> usize {
        *lock(&self.stop_calls)
    }

    /// Get all paths that were read
    pub fn read_calls(&self) -> Vec<String> {
        lock(&self.read_calls).clone()
    }
}

impl Default for MockCrawler {
    fn default() -> Self {
        Self::new()
    }
}

fn log_entry(id: u64, message: &str, job_id: Option<&str>) -> LogEntry {
    LogEntry {
        id,
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        level: "INFO".to_string(),
        message: message.to_string(),
        client_job_id: job_id.map(str::to_string),
    }
}

#[async_trait]
impl BaseMediaCrawler for MockCrawler {
    async fn start_crawl(&self, request: &StartCrawlRequest) -> Result<StartCrawlResponse> {
        lock(&self.start_calls).push(request.clone());

        if let Some(message) = lock(&self.start_error).clone() {
            return Err(anyhow!(message));
        }
        Ok(StartCrawlResponse {
            status: "ok".to_string(),
            accepted_at: None,
            client_job_id: request.client_job_id.clone(),
        })
    }

    async fn stop_crawl(&self) -> Result<()> {
        *lock(&self.stop_calls) += 1;
        let mut statuses = lock(&self.statuses);
        statuses.clear();
        statuses.push_back(CrawlerStatus::new(CrawlerState::Idle));
        Ok(())
    }

    async fn get_status(&self) -> Result<CrawlerStatus> {
        let mut statuses = lock(&self.statuses);
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or_else(|| CrawlerStatus::new(CrawlerState::Idle)))
    }

    async fn check_login_status(&self, _platform: Platform) -> LoginStatus {
        lock(&self.login).clone()
    }

    async fn list_files(&self, _platform: Platform) -> Result<Vec<FileItem>> {
        Ok(lock(&self.files).clone())
    }

    async fn read_file(&self, path: &str, preview: bool, limit: u32) -> Result<serde_json::Value> {
        lock(&self.read_calls).push(path.to_string());

        let content = lock(&self.contents)
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("File not found: {}", path))?;

        Ok(match content {
            serde_json::Value::Array(items) if preview => {
                serde_json::Value::Array(items.into_iter().take(limit as usize).collect())
            }
            other => other,
        })
    }

    async fn get_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let logs = lock(&self.logs);
        let skip = logs.len().saturating_sub(limit as usize);
        Ok(logs.iter().skip(skip).cloned().collect())
    }
}

// =============================================================================
// Failing Store
// =============================================================================

/// In-memory store that can be told to fail an upcoming write.
///
/// Only `set` and `set_ex` count as writes; everything else always succeeds.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    writes_until_failure: Mutex<Option<usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th write from now (1 = the next one), once.
    pub fn fail_nth_write(&self, n: usize) {
        *lock(&self.writes_until_failure) = Some(n.max(1));
    }

    fn check_write(&self, key: &str) -> Result<()> {
        let mut remaining = lock(&self.writes_until_failure);
        match *remaining {
            Some(1) => {
                *remaining = None;
                Err(anyhow!("injected write failure for {}", key))
            }
            Some(n) => {
                *remaining = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_write(key)?;
        self.inner.set(key, value).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_write(key)?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        self.inner.set_nx(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn push_back(&self, list: &str, value: &str) -> Result<()> {
        self.inner.push_back(list, value).await
    }

    async fn pop_front(&self, list: &str) -> Result<Option<String>> {
        self.inner.pop_front(list).await
    }

    async fn list_len(&self, list: &str) -> Result<usize> {
        self.inner.list_len(list).await
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        self.inner.list_range(list).await
    }

    async fn list_remove(&self, list: &str, value: &str) -> Result<usize> {
        self.inner.list_remove(list, value).await
    }

    async fn move_front_to_back(&self, from: &str, to: &str) -> Result<Option<String>> {
        self.inner.move_front_to_back(from, to).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
}

// =============================================================================
// Test Dependencies
// =============================================================================

/// Mock services plus a pipeline config tuned for fast tests.
pub struct TestDependencies {
    pub crawler: Arc<MockCrawler>,
    pub store: Arc<FlakyStore>,
    pub events: MaterialsEvents,
    pub materials: MaterialsConfig,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self::with_crawler(MockCrawler::new())
    }

    pub fn with_crawler(crawler: MockCrawler) -> Self {
        Self {
            crawler: Arc::new(crawler),
            store: Arc::new(FlakyStore::new()),
            events: MaterialsEvents::new(),
            materials: MaterialsConfig {
                job_backoff: Duration::ZERO,
                poll_interval: Duration::from_millis(10),
                job_timeout: Duration::from_secs(5),
                ..MaterialsConfig::default()
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.materials.job_timeout = timeout;
        self
    }

    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            self.crawler.clone(),
            self.events.clone(),
            self.materials.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
