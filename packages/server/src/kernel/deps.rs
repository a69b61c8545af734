//! Server dependencies for the materials pipeline (using traits for testability)
//!
//! This module provides the dependency container shared by the job handler and
//! the facade. All external services use trait abstractions to enable testing.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, MaterialsConfig};
use crate::domains::materials::MaterialsEvents;
use crate::kernel::{BaseMediaCrawler, KeyValueStore, MediaCrawlerAdapter, MemoryStore, RedisStore};

/// Server dependencies (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    /// Queue state and result cache
    pub store: Arc<dyn KeyValueStore>,
    /// Control API of the external crawler
    pub crawler: Arc<dyn BaseMediaCrawler>,
    /// In-process pub/sub for job events, bridged to SSE
    pub events: MaterialsEvents,
    pub materials: MaterialsConfig,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        crawler: Arc<dyn BaseMediaCrawler>,
        events: MaterialsEvents,
        materials: MaterialsConfig,
    ) -> Self {
        Self {
            store,
            crawler,
            events,
            materials,
        }
    }

    /// Connect the production services described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match config.redis_url.as_deref() {
            Some(url) => Arc::new(RedisStore::connect(url).await?),
            None => {
                warn!("REDIS_URL is not set; materials jobs and cache are kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let crawler = MediaCrawlerAdapter::new(
            &config.mediacrawler_api_url,
            config.mediacrawler_api_key.clone(),
        )?;
        info!(url = %config.mediacrawler_api_url, "MediaCrawler client configured");

        Ok(Self::new(
            store,
            Arc::new(crawler),
            MaterialsEvents::new(),
            config.materials.clone(),
        ))
    }
}
