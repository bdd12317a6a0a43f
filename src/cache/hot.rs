//! Hot Cache Module
//!
//! Process-local map from cache key to the latest upstream snapshot.

use std::collections::HashMap;

use crate::cache::CacheEntry;

// == Hot Cache ==
/// In-memory tier with no expiry of its own.
///
/// Entries are never judged here; staleness is decided by the caller's
/// [`FreshnessPolicy`](crate::cache::FreshnessPolicy), so one entry can be
/// fresh for one cache cadence and stale for another.
#[derive(Debug)]
pub struct HotCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> Default for HotCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> HotCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Returns the entry for `key`. Absence is a normal outcome.
    pub fn get(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Set ==
    /// Stores an entry under its own key, replacing any previous entry
    /// wholesale. Returns the replaced entry.
    pub fn set(&mut self, entry: CacheEntry<T>) -> Option<CacheEntry<T>> {
        self.entries.insert(entry.key.clone(), entry)
    }

    // == Clear ==
    /// Removes the entry for `key`. Returns true if one was present.
    pub fn clear(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
