//! Payload and result of a materials crawl job, as stored in the queue.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use mediacrawler_client::Platform;
use serde::{Deserialize, Serialize};

/// Job payload. The worker re-persists it whenever `started_at` or
/// `consumed_paths` change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialsJobData {
    pub org_id: String,
    pub platform: Platform,
    pub keywords: String,
    pub start_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Output files already tried and rejected for this job. Append-only.
    #[serde(default)]
    pub consumed_paths: Vec<String>,
}

impl MaterialsJobData {
    pub fn consumed_set(&self) -> HashSet<String> {
        self.consumed_paths.iter().cloned().collect()
    }

    /// Record a path as consumed. Returns false if it already was.
    pub fn consume(&mut self, path: &str) -> bool {
        if self.consumed_paths.iter().any(|p| p == path) {
            return false;
        }
        self.consumed_paths.push(path.to_string());
        true
    }
}

/// Stored result of a succeeded job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialsJobResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
}
