//! Cache Entry Module
//!
//! Defines cached upstream snapshots and the pending durable writes that
//! reference them.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// == Cache Entry ==
/// A snapshot of one upstream response.
///
/// `captured_at` is the instant the payload was fetched from upstream. It is
/// only ever set by a successful fetch; reading or promoting an entry between
/// tiers carries it over untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Key produced by the cache key builder
    pub key: String,
    /// The cached response body
    pub payload: T,
    /// When the payload was fetched from upstream
    pub captured_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry for a payload fetched at `captured_at`.
    pub fn new(key: impl Into<String>, payload: T, captured_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            captured_at,
        }
    }

    // == Age ==
    /// Age of the snapshot at `now`. Negative if the entry was captured
    /// after `now` (clock skew between instances).
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.captured_at
    }
}

impl<T: Serialize> CacheEntry<T> {
    /// Encodes the entry for the durable store.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    /// Decodes an entry previously written with [`CacheEntry::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

// == Pending Write ==
/// An entry waiting to be written back to the durable store.
#[derive(Debug, Clone)]
pub struct PendingWrite<T> {
    pub entry: CacheEntry<T>,
    /// Diagnostics only
    pub enqueued_at: DateTime<Utc>,
}

impl<T> PendingWrite<T> {
    pub fn new(entry: CacheEntry<T>, enqueued_at: DateTime<Utc>) -> Self {
        Self { entry, enqueued_at }
    }

    pub fn key(&self) -> &str {
        &self.entry.key
    }
}
