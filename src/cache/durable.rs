//! Durable Store Module
//!
//! The durable tier seen by the cache core: a key-value store with per-key
//! TTL, shared across instances and treated as a black box.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::cache::seconds;
use crate::error::StoreResult;

// == Durable Store Trait ==
/// Key-value store with per-key time-to-live.
///
/// Implementations may fail on any call. The cache core catches every
/// failure, logs it and carries on as if the store had no data.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns the stored bytes, or None if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl_secs` seconds.
    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()>;
}

// == Memory Store ==
#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

impl StoredValue {
    /// Expired once the current time reaches the expiry instant.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-process durable store, used when no on-disk store is configured and
/// as a test double.
///
/// Expired keys are dropped lazily when read or overwritten.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held, expired or not.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Utc::now();
        {
            let values = self.values.read().await;
            match values.get(key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }

        let mut values = self.values.write().await;
        if values.get(key).is_some_and(|stored| stored.is_expired(now)) {
            values.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()> {
        let expires_at = Utc::now()
            .checked_add_signed(seconds(ttl_secs))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.values
            .write()
            .await
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }
}
