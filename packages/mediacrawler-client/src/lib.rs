//! Typed client for the MediaCrawler control API.
//!
//! MediaCrawler is a browser-automation crawler running as its own service.
//! It exposes a small HTTP surface to start and stop a single crawl session,
//! report its state, tail its logs, and list or read the JSON files it writes.
//! It has no push channel, so callers poll [`MediaCrawlerClient::get_status`]
//! and [`MediaCrawlerClient::get_logs`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mediacrawler_client::{MediaCrawlerClient, Platform, StartCrawlRequest};
//!
//! let client = MediaCrawlerClient::new("http://127.0.0.1:8081", None)?;
//!
//! let mut request = StartCrawlRequest::search(Platform::Xhs, "AI tools");
//! request.client_job_id = Some("job_123".into());
//! client.start_crawl(&request).await?;
//!
//! let status = client.get_status().await?;
//! println!("{:?}", status.status);
//! ```

pub mod error;
pub mod selection;
pub mod types;

pub use error::{MediaCrawlerError, Result};
pub use selection::{pick_preferred, score_file, select_result_file};
pub use types::{
    CrawlerState, CrawlerStatus, CrawlerType, FileItem, LogEntry, LoginRecommendation,
    LoginStatus, LoginType, Platform, SaveOption, StartCrawlRequest, StartCrawlResponse,
    StopCrawlResponse,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::{FilesResponse, LogsResponse};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8081";

/// Number of log lines requested per poll.
pub const DEFAULT_LOG_LIMIT: u32 = 200;

pub struct MediaCrawlerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MediaCrawlerClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(MediaCrawlerError::InvalidUrl(base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = self.authorize(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MediaCrawlerError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Start a crawl session. The service runs one session at a time.
    pub async fn start_crawl(&self, request: &StartCrawlRequest) -> Result<StartCrawlResponse> {
        tracing::info!(
            platform = %request.platform,
            client_job_id = ?request.client_job_id,
            headless = ?request.headless,
            "Starting MediaCrawler session"
        );
        self.send(self.client.post(self.url("/api/crawler/start")).json(request))
            .await
    }

    pub async fn stop_crawl(&self) -> Result<StopCrawlResponse> {
        tracing::info!("Stopping MediaCrawler session");
        self.send(self.client.post(self.url("/api/crawler/stop")))
            .await
    }

    pub async fn get_status(&self) -> Result<CrawlerStatus> {
        self.send(self.client.get(self.url("/api/crawler/status")))
            .await
    }

    /// Check whether stored cookies allow a headless session.
    ///
    /// Never fails: any error degrades to [`LoginStatus::unavailable`], which
    /// recommends a headed session so the QR login prompt stays reachable.
    pub async fn check_login_status(&self, platform: Platform) -> LoginStatus {
        let url = self.url(&format!("/api/crawler/login-status/{}", platform));
        match self.send::<LoginStatus>(self.client.get(url)).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(%platform, error = %e, "Login status check failed, assuming no login");
                LoginStatus::unavailable()
            }
        }
    }

    /// List JSON output files for a platform.
    pub async fn list_files(&self, platform: Platform) -> Result<Vec<FileItem>> {
        let url = self.url(&format!(
            "/api/data/files?platform={}&file_type=json",
            urlencoding::encode(platform.as_str())
        ));
        let resp: FilesResponse = self.send(self.client.get(url)).await?;
        Ok(resp.files)
    }

    /// Read an output file. With `preview`, at most `limit` records are returned.
    pub async fn read_file(
        &self,
        path: &str,
        preview: bool,
        limit: u32,
    ) -> Result<serde_json::Value> {
        let encoded = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = self.url(&format!(
            "/api/data/files/{}?preview={}&limit={}",
            encoded, preview, limit
        ));
        self.send(self.client.get(url)).await
    }

    /// Most recent log lines, oldest first.
    pub async fn get_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let url = self.url(&format!("/api/crawler/logs?limit={}", limit));
        let resp: LogsResponse = self.send(self.client.get(url)).await?;
        Ok(resp.logs)
    }
}
