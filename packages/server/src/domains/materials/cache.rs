//! Result cache keyed by a query fingerprint.
//!
//! Entries point at a crawler output file plus the count and preview computed
//! when the job finished. They never expire unless a TTL is configured; the
//! facade clears entries whose file turns out to hold the wrong kind of data.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mediacrawler_client::Platform;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::kernel::kv::KeyValueStore;

pub const CACHE_PREFIX: &str = "materials:cache:";

/// Deterministic fingerprint of a query: org, platform, and the trimmed,
/// lower-cased keywords.
pub fn build_fingerprint(org_id: &str, platform: Platform, keywords: &str) -> String {
    let normalized = serde_json::json!({
        "orgId": org_id,
        "platform": platform.as_str(),
        "keywords": keywords.trim().to_lowercase(),
    });

    let mut hasher = Sha256::new();
    hasher.update(normalized.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether an output path may be cached as a content result. Comment and
/// creator dumps never are.
pub fn is_preferred_result_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let lowered = path.to_lowercase();
    !(lowered.contains("comment") || lowered.contains("creator"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub query_hash: String,
    pub result_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
    pub cached_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MaterialsCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Option<Duration>,
}

impl MaterialsCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    fn key(fingerprint: &str) -> String {
        format!("{}{}", CACHE_PREFIX, fingerprint)
    }

    /// Unreadable entries are reported as misses.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        let Some(raw) = self.store.get(&Self::key(fingerprint)).await? else {
            debug!(fingerprint, "materials cache miss");
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if !entry.result_path.is_empty() => {
                debug!(fingerprint, path = %entry.result_path, "materials cache hit");
                Ok(Some(CacheEntry {
                    query_hash: fingerprint.to_string(),
                    ..entry
                }))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(fingerprint, error = %e, "ignoring unreadable materials cache entry");
                Ok(None)
            }
        }
    }

    /// Store a result. Returns false without writing when the path is not an
    /// eligible content file.
    pub async fn set(
        &self,
        fingerprint: &str,
        result_path: &str,
        count: Option<u64>,
        preview: Option<serde_json::Value>,
    ) -> Result<bool> {
        if fingerprint.is_empty() || !is_preferred_result_path(result_path) {
            return Ok(false);
        }

        let entry = CacheEntry {
            query_hash: fingerprint.to_string(),
            result_path: result_path.to_string(),
            count,
            preview,
            cached_at: Utc::now(),
        };
        let raw = serde_json::to_string(&entry).context("failed to serialize cache entry")?;

        match self.ttl {
            Some(ttl) => self.store.set_ex(&Self::key(fingerprint), &raw, ttl).await?,
            None => self.store.set(&Self::key(fingerprint), &raw).await?,
        }
        Ok(true)
    }

    pub async fn clear(&self, fingerprint: &str) -> Result<()> {
        if fingerprint.is_empty() {
            return Ok(());
        }
        self.store.delete(&Self::key(fingerprint)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::kv::MemoryStore;
    use serde_json::json;

    fn cache() -> MaterialsCache {
        MaterialsCache::new(Arc::new(MemoryStore::new()), None)
    }

    #[test]
    fn fingerprint_ignores_keyword_case_and_whitespace() {
        let a = build_fingerprint("org_1", Platform::Xhs, "AI tools");
        let b = build_fingerprint("org_1", Platform::Xhs, "  ai TOOLS \n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_depends_on_org_and_platform() {
        let base = build_fingerprint("org_1", Platform::Xhs, "AI tools");
        assert_ne!(base, build_fingerprint("org_2", Platform::Xhs, "AI tools"));
        assert_ne!(base, build_fingerprint("org_1", Platform::Dy, "AI tools"));
        assert_ne!(base, build_fingerprint("org_1", Platform::Xhs, "AI"));
    }

    #[test]
    fn comment_and_creator_paths_are_not_preferred() {
        assert!(is_preferred_result_path("xhs/json/search_contents_2024.json"));
        assert!(!is_preferred_result_path("xhs/json/search_comments_2024.json"));
        assert!(!is_preferred_result_path("xhs/json/CREATOR_profile.json"));
        assert!(!is_preferred_result_path(""));
    }

    #[tokio::test]
    async fn round_trip_returns_stored_result() {
        let cache = cache();
        let fp = build_fingerprint("org_1", Platform::Xhs, "AI tools");
        let written = cache
            .set(&fp, "xhs/search_contents.json", Some(3), Some(json!([{"note_id": "1"}])))
            .await
            .unwrap();
        assert!(written);

        let entry = cache.get(&fp).await.unwrap().unwrap();
        assert_eq!(entry.result_path, "xhs/search_contents.json");
        assert_eq!(entry.count, Some(3));
        assert_eq!(entry.preview.unwrap()[0]["note_id"], "1");
        assert_eq!(entry.query_hash, fp);
    }

    #[tokio::test]
    async fn ineligible_paths_are_not_cached() {
        let cache = cache();
        let fp = build_fingerprint("org_1", Platform::Xhs, "AI tools");
        let written = cache
            .set(&fp, "xhs/search_comments.json", Some(3), None)
            .await
            .unwrap();
        assert!(!written);
        assert!(cache.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_entry() {
        let cache = cache();
        cache.set("fp", "xhs/contents.json", None, None).await.unwrap();
        cache.clear("fp").await.unwrap();
        assert!(cache.get("fp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_entries_read_as_misses() {
        let store = Arc::new(MemoryStore::new());
        store.set("materials:cache:fp", "not json").await.unwrap();
        let cache = MaterialsCache::new(store, None);
        assert!(cache.get("fp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ttl_entries_expire() {
        let cache = MaterialsCache::new(
            Arc::new(MemoryStore::new()),
            Some(Duration::from_millis(10)),
        );
        cache.set("fp", "xhs/contents.json", None, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get("fp").await.unwrap().is_none());
    }
}
