use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platforms the MediaCrawler service knows how to crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Xhs,
    Dy,
    Bili,
    Ks,
    Wb,
    Tieba,
    Zhihu,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Xhs => "xhs",
            Platform::Dy => "dy",
            Platform::Bili => "bili",
            Platform::Ks => "ks",
            Platform::Wb => "wb",
            Platform::Tieba => "tieba",
            Platform::Zhihu => "zhihu",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xhs" => Ok(Platform::Xhs),
            "dy" => Ok(Platform::Dy),
            "bili" => Ok(Platform::Bili),
            "ks" => Ok(Platform::Ks),
            "wb" => Ok(Platform::Wb),
            "tieba" => Ok(Platform::Tieba),
            "zhihu" => Ok(Platform::Zhihu),
            other => Err(format!("unsupported platform: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlerType {
    Search,
    Detail,
    Login,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    Qrcode,
    Cookie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOption {
    Json,
}

/// Body of `POST /api/crawler/start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartCrawlRequest {
    pub platform: Platform,
    pub crawler_type: CrawlerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_type: Option<LoginType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_option: Option<SaveOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
}

impl StartCrawlRequest {
    /// A keyword search that saves JSON output and logs in by QR code.
    pub fn search(platform: Platform, keywords: impl Into<String>) -> Self {
        Self {
            platform,
            crawler_type: CrawlerType::Search,
            keywords: Some(keywords.into()),
            client_job_id: None,
            login_type: Some(LoginType::Qrcode),
            save_option: Some(SaveOption::Json),
            start_page: None,
            crawl_count: None,
            headless: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartCrawlResponse {
    pub status: String,
    #[serde(default)]
    pub accepted_at: Option<String>,
    #[serde(default)]
    pub client_job_id: Option<String>,
}

/// Process state reported by the crawler service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlerState {
    Idle,
    Running,
    Stopping,
    Error,
    /// Any state this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl CrawlerState {
    /// Whether the external process is still occupying the crawler.
    pub fn is_busy(&self) -> bool {
        matches!(self, CrawlerState::Running | CrawlerState::Stopping)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerStatus {
    pub status: CrawlerState,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub crawler_type: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub client_job_id: Option<String>,
}

impl CrawlerStatus {
    pub fn new(status: CrawlerState) -> Self {
        Self {
            status,
            platform: None,
            crawler_type: None,
            started_at: None,
            error_message: None,
            client_job_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopCrawlResponse {
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginRecommendation {
    Headless,
    Headed,
}

/// Result of `GET /api/crawler/login-status/{platform}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginStatus {
    pub has_valid_login: bool,
    pub recommendation: LoginRecommendation,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cookies_found: Option<Vec<String>>,
}

impl LoginStatus {
    /// Fallback used when the login check itself fails: show the browser so
    /// the user can scan a QR code instead of hanging in a headless session.
    pub fn unavailable() -> Self {
        Self {
            has_valid_login: false,
            recommendation: LoginRecommendation::Headed,
            message: "Unable to check login status, defaulting to headed mode".to_string(),
            cookies_found: None,
        }
    }
}

/// An output artifact written by the crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Seconds since the epoch, possibly fractional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_job_id: Option<String>,
}

impl FileItem {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            created_at: None,
            modified_at: None,
            client_job_id: None,
        }
    }

    pub fn with_client_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.client_job_id = Some(job_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at.to_rfc3339());
        self
    }

    /// Best known timestamp in epoch milliseconds, or 0 when unknown.
    ///
    /// `created_at` wins over `modified_at`. Timestamps without an offset are
    /// read as UTC.
    pub fn timestamp_millis(&self) -> i64 {
        if let Some(created) = self.created_at.as_deref() {
            return parse_timestamp(created)
                .map(|ts| ts.timestamp_millis())
                .unwrap_or(0);
        }
        match self.modified_at {
            Some(secs) => (secs * 1000.0).round() as i64,
            None => 0,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FilesResponse {
    #[serde(default)]
    pub files: Vec<FileItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: String,
    pub level: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_job_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LogsResponse {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("XHS".parse::<Platform>().unwrap(), Platform::Xhs);
        assert_eq!(" dy ".parse::<Platform>().unwrap(), Platform::Dy);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn start_request_skips_unset_fields() {
        let request = StartCrawlRequest::search(Platform::Xhs, "AI tools");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["platform"], "xhs");
        assert_eq!(json["crawler_type"], "search");
        assert_eq!(json["login_type"], "qrcode");
        assert_eq!(json["save_option"], "json");
        assert!(json.get("headless").is_none());
        assert!(json.get("client_job_id").is_none());
    }

    #[test]
    fn created_at_takes_precedence_over_modified_at() {
        let file = FileItem {
            created_at: Some("2025-01-02T03:04:05Z".to_string()),
            modified_at: Some(1.0),
            ..FileItem::new("a.json")
        };
        assert_eq!(file.timestamp_millis(), 1_735_787_045_000);
    }

    #[test]
    fn naive_created_at_is_read_as_utc() {
        let file = FileItem {
            created_at: Some("2025-01-02T03:04:05".to_string()),
            ..FileItem::new("a.json")
        };
        assert_eq!(file.timestamp_millis(), 1_735_787_045_000);
    }

    #[test]
    fn modified_at_is_seconds() {
        let file = FileItem {
            modified_at: Some(1_700_000_000.25),
            ..FileItem::new("a.json")
        };
        assert_eq!(file.timestamp_millis(), 1_700_000_000_250);
        assert_eq!(FileItem::new("b.json").timestamp_millis(), 0);
    }

    #[test]
    fn crawler_status_decodes() {
        let status: CrawlerStatus = serde_json::from_str(
            r#"{"status":"error","platform":"xhs","error_message":"boom"}"#,
        )
        .unwrap();
        assert_eq!(status.status, CrawlerState::Error);
        assert_eq!(status.error_message.as_deref(), Some("boom"));
        assert!(!status.status.is_busy());
    }

    #[test]
    fn unrecognized_crawler_state_decodes_as_unknown() {
        let status: CrawlerStatus =
            serde_json::from_str(r#"{"status":"starting","platform":"xhs"}"#).unwrap();
        assert_eq!(status.status, CrawlerState::Unknown);
        assert!(!status.status.is_busy());
    }
}
