//! Cache Statistics Module
//!
//! Tracks lookup outcomes per tier and write-back activity.

use serde::Serialize;

// == Cache Stats ==
/// Counters for one tiered cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the hot tier
    pub hot_hits: u64,
    /// Lookups answered from the durable tier
    pub durable_hits: u64,
    /// Lookups that went to upstream
    pub misses: u64,
    /// Durable reads that failed or returned an undecodable payload
    pub durable_errors: u64,
    /// Write-back passes started
    pub flushes: u64,
    /// Pending entries written to the durable store
    pub flushed_entries: u64,
    /// Pending entries discarded because their write failed
    pub flush_failures: u64,
    /// Current number of entries in the hot tier
    pub hot_entries: usize,
    /// Entries waiting for the next write-back pass
    pub pending_writes: usize,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Fraction of lookups served from either tier, or 0.0 before the
    /// first lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hot_hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn record_hot_hit(&mut self) {
        self.hot_hits += 1;
    }

    pub fn record_durable_hit(&mut self) {
        self.durable_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_durable_error(&mut self) {
        self.durable_errors += 1;
    }
}
