// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "resolve the output file for a job") should be domain
// functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseMediaCrawler)

use anyhow::Result;
use async_trait::async_trait;
use mediacrawler_client::{
    CrawlerStatus, FileItem, LogEntry, LoginStatus, Platform, StartCrawlRequest,
    StartCrawlResponse,
};

// =============================================================================
// Crawler Control Trait (Infrastructure - external crawl session)
// =============================================================================

/// Control surface of the external crawler. There is a single crawl session,
/// so callers must not run two crawls at once.
#[async_trait]
pub trait BaseMediaCrawler: Send + Sync {
    /// Start a crawl session
    async fn start_crawl(&self, request: &StartCrawlRequest) -> Result<StartCrawlResponse>;

    /// Stop the current crawl session
    async fn stop_crawl(&self) -> Result<()>;

    /// Current state of the crawl session
    async fn get_status(&self) -> Result<CrawlerStatus>;

    /// Whether a saved login exists for the platform.
    ///
    /// Never fails: an unreachable check yields [`LoginStatus::unavailable`].
    async fn check_login_status(&self, platform: Platform) -> LoginStatus;

    /// JSON output files for a platform
    async fn list_files(&self, platform: Platform) -> Result<Vec<FileItem>>;

    /// Read an output file, optionally truncated to `limit` records
    async fn read_file(&self, path: &str, preview: bool, limit: u32) -> Result<serde_json::Value>;

    /// Most recent log lines, oldest first
    async fn get_logs(&self, limit: u32) -> Result<Vec<LogEntry>>;
}
