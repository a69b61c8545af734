//! Generic in-process pub/sub hub for real-time streaming.
//!
//! Provides topic-keyed broadcast channels for pushing events to SSE endpoints.
//! Topics are opaque strings; the hub has no knowledge of what's being streamed.
//!
//! # Usage
//!
//! Producers (job handlers):
//!   hub.publish("job_abc-123", event).await;
//!
//! Consumers (SSE endpoints):
//!   let rx = hub.subscribe("job_abc-123").await;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Default number of buffered messages per topic.
pub const DEFAULT_CAPACITY: usize = 256;

/// Generic in-process pub/sub hub.
///
/// Thread-safe, cloneable. Keyed by string topics. Delivery is best-effort:
/// a subscriber only sees messages published after it subscribed.
pub struct StreamHub<T> {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<T>>>>,
    capacity: usize,
}

impl<T> Clone for StreamHub<T> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone + Send + 'static> StreamHub<T> {
    /// Create a new StreamHub with default capacity (256 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new StreamHub with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a value to a topic. Returns the number of receivers reached.
    pub async fn publish(&self, topic: &str, value: T) -> usize {
        let channels = self.channels.read().await;
        match channels.get(topic) {
            // Send errors only mean there are no active receivers
            Some(tx) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<T> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Drop a topic. Receivers drain what was already sent, then see the
    /// channel as closed.
    pub async fn close(&self, topic: &str) {
        self.channels.write().await.remove(topic);
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl<T: Clone + Send + 'static> Default for StreamHub<T> {
    fn default() -> Self {
        Self::new()
    }
}
