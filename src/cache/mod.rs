//! Cache Module
//!
//! Tiered response cache: an in-memory hot tier in front of a durable
//! key-value tier, with freshness decided per caller and batched write-back.

mod durable;
mod entry;
mod freshness;
mod hot;
mod key;
mod sled_store;
mod stats;
mod tiered;
mod write_back;


// Re-export public types
pub use durable::{DurableStore, MemoryStore};
pub use entry::{CacheEntry, PendingWrite};
pub use freshness::{is_fresh, FreshnessPolicy};
pub use hot::HotCache;
pub use key::{CacheKeyBuilder, LogicalQuery, QueryFilter};
pub use sled_store::SledStore;
pub use stats::CacheStats;
pub use tiered::{CacheSettings, Lookup, TieredCache};
pub use write_back::{FlushReport, WriteBackScheduler};

// == Public Constants ==
/// Default TTL in seconds handed to the durable store on write-back
pub const DEFAULT_DURABLE_TTL: u64 = 24 * 60 * 60;

// == Utility Functions ==
/// Converts a whole number of seconds into a chrono duration, saturating
/// instead of panicking on out-of-range values.
pub fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
