//! Freshness Module
//!
//! Decides whether a cached snapshot can still be served for a given polling
//! interval.

use chrono::{DateTime, Utc};

use crate::cache::{seconds, CacheEntry};

/// Returns true if a snapshot captured at `captured_at` is younger than
/// `polling_interval_secs` at `now`.
///
/// The boundary is strict: an entry exactly `polling_interval_secs` old is
/// stale.
pub fn is_fresh(captured_at: DateTime<Utc>, polling_interval_secs: u64, now: DateTime<Utc>) -> bool {
    now - captured_at < seconds(polling_interval_secs)
}

// == Freshness Policy ==
/// Polling-interval threshold for one logical cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    polling_interval_secs: u64,
}

impl FreshnessPolicy {
    pub fn new(polling_interval_secs: u64) -> Self {
        Self {
            polling_interval_secs,
        }
    }

    pub fn polling_interval_secs(&self) -> u64 {
        self.polling_interval_secs
    }

    // == Is Fresh ==
    /// Checks an entry against this policy's polling interval.
    pub fn is_fresh<T>(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        is_fresh(entry.captured_at, self.polling_interval_secs, now)
    }
}
