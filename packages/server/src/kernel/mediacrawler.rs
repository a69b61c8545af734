use anyhow::{Context, Result};
use async_trait::async_trait;
use mediacrawler_client::{
    CrawlerStatus, FileItem, LogEntry, LoginStatus, MediaCrawlerClient, Platform,
    StartCrawlRequest, StartCrawlResponse,
};

use super::BaseMediaCrawler;

/// [`BaseMediaCrawler`] backed by the MediaCrawler HTTP API.
pub struct MediaCrawlerAdapter {
    client: MediaCrawlerClient,
}

impl MediaCrawlerAdapter {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = MediaCrawlerClient::new(base_url, api_key)
            .context("Failed to create MediaCrawler client")?;
        Ok(Self { client })
    }

    pub fn from_client(client: MediaCrawlerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BaseMediaCrawler for MediaCrawlerAdapter {
    async fn start_crawl(&self, request: &StartCrawlRequest) -> Result<StartCrawlResponse> {
        self.client
            .start_crawl(request)
            .await
            .context("MediaCrawler start failed")
    }

    async fn stop_crawl(&self) -> Result<()> {
        self.client
            .stop_crawl()
            .await
            .context("MediaCrawler stop failed")?;
        Ok(())
    }

    async fn get_status(&self) -> Result<CrawlerStatus> {
        self.client
            .get_status()
            .await
            .context("MediaCrawler status failed")
    }

    async fn check_login_status(&self, platform: Platform) -> LoginStatus {
        self.client.check_login_status(platform).await
    }

    async fn list_files(&self, platform: Platform) -> Result<Vec<FileItem>> {
        self.client
            .list_files(platform)
            .await
            .with_context(|| format!("Failed to list {} output files", platform))
    }

    async fn read_file(&self, path: &str, preview: bool, limit: u32) -> Result<serde_json::Value> {
        self.client
            .read_file(path, preview, limit)
            .await
            .with_context(|| format!("Failed to read output file {}", path))
    }

    async fn get_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        self.client
            .get_logs(limit)
            .await
            .context("Failed to fetch MediaCrawler logs")
    }
}
