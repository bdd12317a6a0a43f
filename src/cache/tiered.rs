//! Tiered Cache Module
//!
//! Composes the hot tier, the durable tier, the freshness policy and the
//! write-back scheduler into a single get-or-fetch operation.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheKeyBuilder, CacheStats, DurableStore, FlushReport, FreshnessPolicy, HotCache,
    LogicalQuery, WriteBackScheduler, DEFAULT_DURABLE_TTL,
};

// == Cache Settings ==
/// Per-cache cadences, supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Age in seconds below which a snapshot is served without refetching
    pub polling_interval_secs: u64,
    /// Minimum seconds between two write-back passes
    pub flush_interval_secs: u64,
    /// TTL in seconds for durable writes
    pub durable_ttl_secs: u64,
    /// Run due write-back passes on a detached task instead of awaiting them
    pub background_flush: bool,
}

impl CacheSettings {
    pub fn new(polling_interval_secs: u64, flush_interval_secs: u64) -> Self {
        Self {
            polling_interval_secs,
            flush_interval_secs,
            durable_ttl_secs: DEFAULT_DURABLE_TTL,
            background_flush: true,
        }
    }

    pub fn with_durable_ttl(mut self, durable_ttl_secs: u64) -> Self {
        self.durable_ttl_secs = durable_ttl_secs;
        self
    }

    pub fn with_background_flush(mut self, background_flush: bool) -> Self {
        self.background_flush = background_flush;
        self
    }
}

// == Lookup ==
/// Result of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub key: String,
    pub payload: T,
    /// True when served from either tier without calling upstream
    pub from_cache: bool,
    pub captured_at: DateTime<Utc>,
}

impl<T> Lookup<T> {
    fn cached(entry: CacheEntry<T>) -> Self {
        Self {
            key: entry.key,
            payload: entry.payload,
            from_cache: true,
            captured_at: entry.captured_at,
        }
    }

    fn fetched(entry: CacheEntry<T>) -> Self {
        Self {
            from_cache: false,
            ..Self::cached(entry)
        }
    }
}

// == Tiered Cache ==
/// One logical cache (e.g. news or quotes) over a shared durable store.
///
/// Constructed once at startup and shared by reference with every handler
/// that needs it. State is local to this process; instances never
/// coordinate beyond the durable store.
pub struct TieredCache<T> {
    keys: CacheKeyBuilder,
    freshness: FreshnessPolicy,
    hot: RwLock<HotCache<T>>,
    store: Arc<dyn DurableStore>,
    write_back: Arc<WriteBackScheduler<T>>,
    stats: Mutex<CacheStats>,
    background_flush: bool,
    /// Background write-back passes not yet known to have finished
    in_flight: Mutex<JoinSet<()>>,
}

impl<T> TieredCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache whose write-back clock starts now.
    pub fn new(namespace: &str, settings: CacheSettings, store: Arc<dyn DurableStore>) -> Self {
        Self::starting_at(namespace, settings, store, Utc::now())
    }

    /// Creates a cache whose write-back clock starts at `started_at`.
    pub fn starting_at(
        namespace: &str,
        settings: CacheSettings,
        store: Arc<dyn DurableStore>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let write_back = WriteBackScheduler::new(
            store.clone(),
            settings.flush_interval_secs,
            settings.durable_ttl_secs,
            started_at,
        );

        Self {
            keys: CacheKeyBuilder::new(namespace),
            freshness: FreshnessPolicy::new(settings.polling_interval_secs),
            hot: RwLock::new(HotCache::new()),
            store,
            write_back: Arc::new(write_back),
            stats: Mutex::new(CacheStats::new()),
            background_flush: settings.background_flush,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        self.keys.namespace()
    }

    pub fn key_for(&self, query: &LogicalQuery) -> String {
        self.keys.build_key(query)
    }

    pub fn write_back(&self) -> &WriteBackScheduler<T> {
        &self.write_back
    }

    // == Lookup ==
    /// Serves `query` from cache or calls `fetch`, using the current time.
    pub async fn lookup<F, Fut, E>(&self, query: &LogicalQuery, fetch: F) -> Result<Lookup<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.lookup_at(query, Utc::now(), fetch).await
    }

    /// Serves `query` as of `now`.
    ///
    /// Order: fresh hot entry, then fresh durable entry (promoted into the
    /// hot tier), then `fetch`. A fetched payload replaces the hot entry and
    /// is queued for write-back. Durable failures count as misses; a fetch
    /// error is returned unchanged and nothing is cached. Every outcome,
    /// including a fetch error, may start a due write-back pass.
    pub async fn lookup_at<F, Fut, E>(
        &self,
        query: &LogicalQuery,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<Lookup<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.keys.build_key(query);

        let hot_entry = self.hot.read().await.get(&key).cloned();
        if let Some(entry) = hot_entry.filter(|e| self.freshness.is_fresh(e, now)) {
            self.stats.lock().await.record_hot_hit();
            debug!(key = %key, "Hot cache hit");
            self.after_request(now).await;
            return Ok(Lookup::cached(entry));
        }

        if let Some(entry) = self.read_durable(&key).await {
            if self.freshness.is_fresh(&entry, now) {
                self.stats.lock().await.record_durable_hit();
                debug!(key = %key, "Durable cache hit, promoting");
                self.hot.write().await.set(entry.clone());
                self.after_request(now).await;
                return Ok(Lookup::cached(entry));
            }
        }

        self.stats.lock().await.record_miss();
        debug!(key = %key, "Cache miss, fetching upstream");
        let payload = match fetch().await {
            Ok(payload) => payload,
            Err(e) => {
                // A failed fetch still answers the request, so a due pass runs.
                self.after_request(now).await;
                return Err(e);
            }
        };

        let entry = CacheEntry::new(key, payload, now);
        self.hot.write().await.set(entry.clone());
        self.write_back.record_dirty(entry.clone(), now).await;
        self.after_request(now).await;

        Ok(Lookup::fetched(entry))
    }

    /// Reads and decodes the durable entry for `key`. Any failure is logged
    /// and reported as absence.
    async fn read_durable(&self, key: &str) -> Option<CacheEntry<T>> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(key, error = %e, "Durable read failed, treating as miss");
                self.stats.lock().await.record_durable_error();
                return None;
            }
        };

        match CacheEntry::<T>::from_bytes(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "Malformed durable payload, treating as miss");
                self.stats.lock().await.record_durable_error();
                None
            }
        }
    }

    /// Starts a write-back pass if one is due. Never fails and, with
    /// background flushing, never waits for the durable store.
    async fn after_request(&self, now: DateTime<Utc>) {
        if !self.background_flush {
            self.write_back.maybe_flush(now).await;
            return;
        }

        if let Some(batch) = self.write_back.take_due(now).await {
            let write_back = self.write_back.clone();
            let mut in_flight = self.in_flight.lock().await;
            while in_flight.try_join_next().is_some() {}
            in_flight.spawn(async move {
                write_back.persist(batch).await;
            });
        }
    }

    /// Waits for every background write-back pass started so far.
    async fn wait_in_flight(&self) {
        let mut passes = std::mem::take(&mut *self.in_flight.lock().await);
        while let Some(result) = passes.join_next().await {
            if let Err(e) = result {
                warn!(
                    namespace = %self.namespace(),
                    error = %e,
                    "Background write-back pass did not complete"
                );
            }
        }
    }

    // == Invalidate ==
    /// Drops the hot entry for `query`. The durable tier is left alone.
    pub async fn invalidate(&self, query: &LogicalQuery) -> bool {
        let key = self.keys.build_key(query);
        self.hot.write().await.clear(&key)
    }

    // == Flush Pending ==
    /// Writes every pending entry now, regardless of the flush interval.
    ///
    /// Background passes already under way are awaited first, so once this
    /// returns every entry recorded before the call has been attempted.
    pub async fn flush_pending(&self) -> FlushReport {
        self.flush_pending_at(Utc::now()).await
    }

    pub async fn flush_pending_at(&self, now: DateTime<Utc>) -> FlushReport {
        self.wait_in_flight().await;
        self.write_back.flush_pending(now).await
    }

    // == Stats ==
    /// Snapshot of lookup and write-back counters.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().await.clone();
        stats.hot_entries = self.hot.read().await.len();
        self.write_back.fill_stats(&mut stats).await;
        stats
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::{StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Durable store whose reads and writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        put_delay_ms: AtomicU64,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl DurableStore for FlakyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("read refused".to_string()));
            }
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            let delay = self.put_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("write refused".to_string()));
            }
            self.inner.put(key, value, ttl_secs).await
        }
    }

    fn cache(store: Arc<FlakyStore>, polling: u64, flush: u64) -> TieredCache<String> {
        let settings = CacheSettings::new(polling, flush).with_background_flush(false);
        TieredCache::starting_at("news", settings, store, t(0))
    }

    fn ok(payload: &str) -> impl Future<Output = Result<String, String>> {
        let payload = payload.to_string();
        async move { Ok(payload) }
    }

    #[tokio::test]
    async fn test_miss_then_hot_hit() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store, 300, 60);
        let query = LogicalQuery::new(["AAPL"]);

        let first = cache.lookup_at(&query, t(0), || ok("v1")).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.payload, "v1");
        assert_eq!(first.captured_at, t(0));

        let second = cache
            .lookup_at(&query, t(10), || async { Err::<String, String>("not called".into()) })
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.payload, "v1");
        assert_eq!(second.captured_at, t(0));
    }

    #[tokio::test]
    async fn test_polling_boundary() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store, 300, 3600);
        let query = LogicalQuery::new(["AAPL"]);

        cache.lookup_at(&query, t(0), || ok("v1")).await.unwrap();

        let at_299 = cache.lookup_at(&query, t(299), || ok("v2")).await.unwrap();
        assert!(at_299.from_cache);
        assert_eq!(at_299.payload, "v1");

        let at_300 = cache.lookup_at(&query, t(300), || ok("v2")).await.unwrap();
        assert!(!at_300.from_cache);
        assert_eq!(at_300.payload, "v2");
        assert_eq!(at_300.captured_at, t(300));
    }

    #[tokio::test]
    async fn test_upstream_error_propagates_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store, 300, 60);
        let query = LogicalQuery::new(["AAPL"]);

        let result = cache
            .lookup_at(&query, t(0), || async { Err::<String, &str>("upstream down") })
            .await;
        assert_eq!(result.unwrap_err(), "upstream down");

        let stats = cache.stats().await;
        assert_eq!(stats.hot_entries, 0);
        assert_eq!(stats.pending_writes, 0);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_stale_entry_not_served_when_upstream_fails() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store, 60, 3600);
        let query = LogicalQuery::new(["AAPL"]);

        cache.lookup_at(&query, t(0), || ok("v1")).await.unwrap();
        let result = cache
            .lookup_at(&query, t(60), || async { Err::<String, &str>("timeout") })
            .await;
        assert_err!(result);
    }

    #[tokio::test]
    async fn test_failed_fetch_still_runs_due_flush() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store.clone(), 300, 60);
        let aapl = LogicalQuery::new(["AAPL"]);

        cache.lookup_at(&aapl, t(0), || ok("v1")).await.unwrap();
        assert_eq!(cache.stats().await.pending_writes, 1);

        let result = cache
            .lookup_at(&LogicalQuery::new(["MSFT"]), t(61), || async {
                Err::<String, &str>("provider unavailable")
            })
            .await;
        assert_eq!(result.unwrap_err(), "provider unavailable");

        let stats = cache.stats().await;
        assert_eq!(stats.pending_writes, 0);
        assert_eq!(stats.flushed_entries, 1);
        assert!(store.inner.get(&cache.key_for(&aapl)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted() {
        let store = Arc::new(FlakyStore::default());
        let writer = cache(store.clone(), 300, 60);
        let query = LogicalQuery::new(["MSFT"]);

        writer.lookup_at(&query, t(0), || ok("v1")).await.unwrap();
        writer.flush_pending_at(t(1)).await;

        // A second instance sharing only the durable store.
        let reader = cache(store.clone(), 300, 60);
        let hit = reader
            .lookup_at(&query, t(100), || ok("unused"))
            .await
            .unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.payload, "v1");
        assert_eq!(hit.captured_at, t(0));

        let stats = reader.stats().await;
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.hot_entries, 1);
        assert_eq!(stats.pending_writes, 0, "promotion must not mark entry dirty");
    }

    #[tokio::test]
    async fn test_stale_durable_entry_refetches() {
        let store = Arc::new(FlakyStore::default());
        let writer = cache(store.clone(), 300, 60);
        let query = LogicalQuery::new(["MSFT"]);

        writer.lookup_at(&query, t(0), || ok("v1")).await.unwrap();
        writer.flush_pending_at(t(1)).await;

        let reader = cache(store, 300, 3600);
        let result = reader.lookup_at(&query, t(300), || ok("v2")).await.unwrap();
        assert!(!result.from_cache);
        assert_eq!(result.payload, "v2");
    }

    #[tokio::test]
    async fn test_durable_read_failure_is_a_miss() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let cache = cache(store, 300, 60);
        let query = LogicalQuery::new(["AAPL"]);

        let result = assert_ok!(cache.lookup_at(&query, t(0), || ok("fresh")).await);
        assert!(!result.from_cache);
        assert_eq!(result.payload, "fresh");

        let stats = cache.stats().await;
        assert_eq!(stats.durable_errors, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_malformed_durable_payload_is_a_miss() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store.clone(), 300, 60);
        let query = LogicalQuery::new(["AAPL"]);
        let key = cache.key_for(&query);
        store.inner.put(&key, b"{broken".to_vec(), 60).await.unwrap();

        let result = cache.lookup_at(&query, t(0), || ok("fresh")).await.unwrap();
        assert!(!result.from_cache);
        assert_eq!(cache.stats().await.durable_errors, 1);
    }

    #[tokio::test]
    async fn test_write_back_batches_misses() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store.clone(), 300, 60);

        for (i, sym) in ["AAPL", "MSFT", "GOOG"].iter().enumerate() {
            let query = LogicalQuery::new([*sym]);
            cache
                .lookup_at(&query, t(i as i64 * 10), || ok(sym))
                .await
                .unwrap();
        }
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);

        // Hot hit at t=30: interval not elapsed since start.
        cache
            .lookup_at(&LogicalQuery::new(["AAPL"]), t(30), || ok("unused"))
            .await
            .unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);

        // Hot hit at t=60 triggers the pass carrying all three.
        cache
            .lookup_at(&LogicalQuery::new(["AAPL"]), t(60), || ok("unused"))
            .await
            .unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().await.flushed_entries, 3);
    }

    #[tokio::test]
    async fn test_write_failures_never_reach_caller() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let cache = cache(store.clone(), 300, 0);

        let result = cache
            .lookup_at(&LogicalQuery::new(["AAPL"]), t(0), || ok("v"))
            .await;
        assert_ok!(result);

        let stats = cache.stats().await;
        assert_eq!(stats.flush_failures, 1);
        assert_eq!(stats.pending_writes, 0);
    }

    #[tokio::test]
    async fn test_invalidate_drops_hot_entry_only() {
        let store = Arc::new(FlakyStore::default());
        let cache = cache(store.clone(), 300, 60);
        let query = LogicalQuery::new(["AAPL"]);

        cache.lookup_at(&query, t(0), || ok("v1")).await.unwrap();
        cache.flush_pending_at(t(1)).await;

        assert!(cache.invalidate(&query).await);
        assert!(!cache.invalidate(&query).await);

        // Durable copy still answers.
        let result = cache.lookup_at(&query, t(2), || ok("v2")).await.unwrap();
        assert!(result.from_cache);
        assert_eq!(result.payload, "v1");
    }

    #[tokio::test]
    async fn test_background_flush_writes_eventually() {
        let store = Arc::new(FlakyStore::default());
        let settings = CacheSettings::new(300, 0);
        let cache = TieredCache::<String>::starting_at("quotes", settings, store.clone(), t(0));

        cache
            .lookup_at(&LogicalQuery::new(["AAPL"]), t(0), || ok("v"))
            .await
            .unwrap();

        for _ in 0..50 {
            if store.puts.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_pending_waits_for_background_pass() {
        let store = Arc::new(FlakyStore::default());
        store.put_delay_ms.store(100, Ordering::SeqCst);
        let settings = CacheSettings::new(300, 0);
        let cache = TieredCache::<String>::starting_at("quotes", settings, store.clone(), t(0));
        let query = LogicalQuery::new(["AAPL"]);

        // The due pass takes the batch and runs on a background task.
        cache.lookup_at(&query, t(0), || ok("v")).await.unwrap();
        assert_eq!(cache.stats().await.pending_writes, 0);

        let report = cache.flush_pending_at(t(1)).await;
        assert_eq!(report.attempted, 0);
        assert!(store.inner.get(&cache.key_for(&query)).await.unwrap().is_some());
        assert_eq!(cache.stats().await.flushed_entries, 1);
    }

    #[test]
    fn test_settings_builder() {
        let settings = CacheSettings::new(300, 60)
            .with_durable_ttl(120)
            .with_background_flush(false);
        assert_eq!(settings.polling_interval_secs, 300);
        assert_eq!(settings.flush_interval_secs, 60);
        assert_eq!(settings.durable_ttl_secs, 120);
        assert!(!settings.background_flush);
    }
}
