//! Key-value store abstraction shared by the job queue and the result cache.
//!
//! Production uses Redis through a [`ConnectionManager`]; tests and local runs
//! without Redis use [`MemoryStore`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use tracing::info;

/// String keys, string values, plus FIFO lists.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Set with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Set only if the key is absent. Returns whether the value was written.
    async fn set_nx(&self, key: &str, value: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Append to the tail of a list.
    async fn push_back(&self, list: &str, value: &str) -> Result<()>;

    /// Remove and return the head of a list.
    async fn pop_front(&self, list: &str) -> Result<Option<String>>;

    async fn list_len(&self, list: &str) -> Result<usize>;

    /// Every element of a list, head first.
    async fn list_range(&self, list: &str) -> Result<Vec<String>>;

    /// Remove all occurrences of `value`. Returns how many were removed.
    async fn list_remove(&self, list: &str, value: &str) -> Result<usize>;

    /// Atomically pop the head of `from` and append it to `to`.
    async fn move_front_to_back(&self, from: &str, to: &str) -> Result<Option<String>>;

    /// Every live string key starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

// =============================================================================
// Redis
// =============================================================================

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.context("Redis GET failed")
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .context("Redis SET failed")
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .context("Redis SETEX failed")
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.set_nx(key, value).await.context("Redis SETNX failed")
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.context("Redis DEL failed")
    }

    async fn push_back(&self, list: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(list, value)
            .await
            .context("Redis RPUSH failed")
    }

    async fn pop_front(&self, list: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.lpop(list, None::<NonZeroUsize>)
            .await
            .context("Redis LPOP failed")
    }

    async fn list_len(&self, list: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        conn.llen(list).await.context("Redis LLEN failed")
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.lrange(list, 0, -1).await.context("Redis LRANGE failed")
    }

    async fn list_remove(&self, list: &str, value: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        conn.lrem(list, 0, value).await.context("Redis LREM failed")
    }

    async fn move_front_to_back(&self, from: &str, to: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.lmove(from, to, Direction::Left, Direction::Right)
            .await
            .context("Redis LMOVE failed")
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.keys(format!("{}*", prefix))
            .await
            .context("Redis KEYS failed")
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, (String, Option<Instant>)>,
    lists: HashMap<String, VecDeque<String>>,
}

impl MemoryState {
    fn live_value(&mut self, key: &str) -> Option<&String> {
        let expired = matches!(
            self.values.get(key),
            Some((_, Some(deadline))) if *deadline <= Instant::now()
        );
        if expired {
            self.values.remove(key);
        }
        self.values.get(key).map(|(value, _)| value)
    }
}

/// Process-local store with the same semantics as [`RedisStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.with_state(|s| s.live_value(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_state(|s| {
            s.values.insert(key.to_string(), (value.to_string(), None));
        });
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.with_state(|s| {
            s.values.insert(
                key.to_string(),
                (value.to_string(), Some(Instant::now() + ttl)),
            );
        });
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        Ok(self.with_state(|s| {
            if s.live_value(key).is_some() {
                return false;
            }
            s.values.insert(key.to_string(), (value.to_string(), None));
            true
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_state(|s| {
            s.values.remove(key);
            s.lists.remove(key);
        });
        Ok(())
    }

    async fn push_back(&self, list: &str, value: &str) -> Result<()> {
        self.with_state(|s| {
            s.lists
                .entry(list.to_string())
                .or_default()
                .push_back(value.to_string());
        });
        Ok(())
    }

    async fn pop_front(&self, list: &str) -> Result<Option<String>> {
        Ok(self.with_state(|s| s.lists.get_mut(list).and_then(|l| l.pop_front())))
    }

    async fn list_len(&self, list: &str) -> Result<usize> {
        Ok(self.with_state(|s| s.lists.get(list).map_or(0, |l| l.len())))
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        Ok(self.with_state(|s| {
            s.lists
                .get(list)
                .map(|l| l.iter().cloned().collect())
                .unwrap_or_default()
        }))
    }

    async fn list_remove(&self, list: &str, value: &str) -> Result<usize> {
        Ok(self.with_state(|s| match s.lists.get_mut(list) {
            Some(l) => {
                let before = l.len();
                l.retain(|item| item != value);
                before - l.len()
            }
            None => 0,
        }))
    }

    async fn move_front_to_back(&self, from: &str, to: &str) -> Result<Option<String>> {
        Ok(self.with_state(|s| {
            let value = s.lists.get_mut(from)?.pop_front()?;
            s.lists
                .entry(to.to_string())
                .or_default()
                .push_back(value.clone());
            Some(value)
        }))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.with_state(|s| {
            let candidates: Vec<String> = s
                .values
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();
            candidates
                .into_iter()
                .filter(|key| s.live_value(key).is_some())
                .collect()
        }))
    }
}
