use anyhow::{Context, Result};
use dotenvy::dotenv;
use mediacrawler_client::Platform;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::kernel::jobs::{QueueConfig, DEFAULT_RETENTION};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means the in-process store is used.
    pub redis_url: Option<String>,
    pub port: u16,
    pub mediacrawler_api_url: String,
    pub mediacrawler_api_key: Option<String>,
    pub materials: MaterialsConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            mediacrawler_api_url: env::var("MEDIACRAWLER_API_URL")
                .unwrap_or_else(|_| mediacrawler_client::DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            mediacrawler_api_key: env::var("MEDIACRAWLER_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            materials: MaterialsConfig::from_lookup(|key| env::var(key).ok()),
        })
    }
}

/// Tuning for the materials crawl pipeline.
#[derive(Debug, Clone)]
pub struct MaterialsConfig {
    pub queue_name: String,
    pub dlq_name: String,
    pub job_attempts: u32,
    pub job_backoff: Duration,
    /// How long finished jobs and dead letters are kept. `None` keeps them.
    pub job_retention: Option<Duration>,
    pub poll_interval: Duration,
    /// Wall-clock ceiling for one crawl.
    pub job_timeout: Duration,
    pub page_size_xhs: u32,
    pub page_size_dy: u32,
    pub page_size_default: u32,
    /// Max records read from an output file.
    pub result_limit: u32,
    /// `None` keeps cache entries until they are cleared.
    pub cache_ttl: Option<Duration>,
    pub logs_forwarding: bool,
    /// Base used when rewriting `local:` media references.
    pub backend_url: String,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_RESULT_LIMIT: u32 = 200;

impl Default for MaterialsConfig {
    fn default() -> Self {
        Self {
            queue_name: "materials".to_string(),
            dlq_name: "materials-dlq".to_string(),
            job_attempts: 3,
            job_backoff: Duration::from_millis(5000),
            job_retention: Some(DEFAULT_RETENTION),
            poll_interval: Duration::from_millis(2000),
            job_timeout: Duration::from_secs(30 * 60),
            page_size_xhs: DEFAULT_PAGE_SIZE,
            page_size_dy: DEFAULT_PAGE_SIZE,
            page_size_default: DEFAULT_PAGE_SIZE,
            result_limit: DEFAULT_RESULT_LIMIT,
            cache_ttl: None,
            logs_forwarding: true,
            backend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl MaterialsConfig {
    /// Build from a variable lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let queue_name = lookup("MATERIALS_QUEUE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.queue_name);
        let dlq_name = lookup("MATERIALS_DLQ_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{}-dlq", queue_name));

        let poll_ms = parse_or(
            lookup("MATERIALS_JOB_POLL_INTERVAL_MS").or_else(|| lookup("MATERIALS_POLL_INTERVAL_MS")),
            2000u64,
        );

        let max_runtime_secs: i64 = parse_or(lookup("MATERIALS_MAX_RUNTIME_SECONDS"), 0);
        let job_timeout = if max_runtime_secs > 0 {
            Duration::from_secs(max_runtime_secs as u64)
        } else {
            Duration::from_millis(parse_or(lookup("MATERIALS_JOB_TIMEOUT_MS"), 30 * 60 * 1000u64))
        };

        let result_limit: i64 = parse_or(
            lookup("MATERIALS_RESULT_LIMIT"),
            i64::from(DEFAULT_RESULT_LIMIT),
        );
        let result_limit = u32::try_from(result_limit)
            .ok()
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_RESULT_LIMIT);

        let cache_ttl_secs: u64 = parse_or(lookup("MATERIALS_CACHE_TTL_SECONDS"), 0);
        let retention_secs: u64 = parse_or(
            lookup("MATERIALS_JOB_RETENTION_SECONDS"),
            DEFAULT_RETENTION.as_secs(),
        );

        Self {
            queue_name,
            dlq_name,
            job_attempts: parse_or(lookup("MATERIALS_JOB_ATTEMPTS"), defaults.job_attempts),
            job_backoff: Duration::from_millis(parse_or(lookup("MATERIALS_JOB_BACKOFF_MS"), 5000u64)),
            job_retention: (retention_secs > 0).then(|| Duration::from_secs(retention_secs)),
            poll_interval: Duration::from_millis(poll_ms),
            job_timeout,
            page_size_xhs: parse_or(lookup("MATERIALS_PAGE_SIZE_XHS"), DEFAULT_PAGE_SIZE),
            page_size_dy: parse_or(lookup("MATERIALS_PAGE_SIZE_DY"), DEFAULT_PAGE_SIZE),
            page_size_default: parse_or(lookup("MATERIALS_PAGE_SIZE_DEFAULT"), DEFAULT_PAGE_SIZE),
            result_limit,
            cache_ttl: (cache_ttl_secs > 0).then(|| Duration::from_secs(cache_ttl_secs)),
            logs_forwarding: lookup("ENABLE_CRAWLER_LOGS_FORWARDING").as_deref() != Some("false"),
            backend_url: lookup("BACKEND_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.backend_url)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn page_size(&self, platform: Platform) -> u32 {
        match platform {
            Platform::Xhs => self.page_size_xhs,
            Platform::Dy => self.page_size_dy,
            _ => self.page_size_default,
        }
    }

    /// Records requested from the crawler: pages times the platform page size.
    pub fn crawl_count(&self, platform: Platform, page_limit: Option<f64>) -> u32 {
        let pages = match page_limit {
            Some(limit) if limit.is_finite() && limit >= 1.0 => limit.floor() as u32,
            _ => 1,
        };
        pages.saturating_mul(self.page_size(platform))
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            name: self.queue_name.clone(),
            dead_letter_name: self.dlq_name.clone(),
            max_attempts: self.job_attempts,
            backoff: self.job_backoff,
            retention: self.job_retention,
        }
    }
}
