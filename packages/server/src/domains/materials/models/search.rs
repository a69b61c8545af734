//! Inputs and outputs of the materials facade.

use chrono::{DateTime, Utc};
use mediacrawler_client::Platform;
use serde::{Deserialize, Serialize};

use crate::kernel::jobs::JobState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub org_id: String,
    pub platform: Platform,
    pub keywords: String,
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default)]
    pub page_limit: Option<f64>,
    /// Skip the cache and always start a crawl.
    #[serde(default)]
    pub force_crawl: bool,
}

fn default_start_page() -> u32 {
    1
}

impl SearchQuery {
    pub fn new(org_id: impl Into<String>, platform: Platform, keywords: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            platform,
            keywords: keywords.into(),
            start_page: default_start_page(),
            page_limit: None,
            force_crawl: false,
        }
    }
}

/// Answer to a search: either a cache hit carrying results, or a queued job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub job_id: Option<String>,
    pub state: JobState,
    pub cached_results: serde_json::Value,
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub state: JobState,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultView {
    pub job_id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
