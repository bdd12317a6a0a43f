//! Write-Back Module
//!
//! Accumulates freshly fetched entries and writes them to the durable store
//! in batches, at most one pass per flush interval.
//!
//! There is no timer: callers invoke [`WriteBackScheduler::maybe_flush`]
//! after answering a request, so the bound is "at most one pass per
//! interval of wall-clock time", not "one pass every interval".

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{seconds, CacheEntry, CacheStats, DurableStore, PendingWrite};

// == Flush Report ==
/// Outcome of one write-back pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Pending entries taken into the pass
    pub attempted: usize,
    /// Entries the durable store accepted
    pub written: usize,
    /// Entries discarded after a failed encode or write
    pub failed: usize,
}

impl FlushReport {
    /// Adds another report's counts to this one.
    pub fn merge(&mut self, other: FlushReport) {
        self.attempted += other.attempted;
        self.written += other.written;
        self.failed += other.failed;
    }
}

#[derive(Debug)]
struct SchedulerState<T> {
    pending: HashMap<String, PendingWrite<T>>,
    last_flush_at: DateTime<Utc>,
    flushes: u64,
    flushed_entries: u64,
    flush_failures: u64,
}

// == Write-Back Scheduler ==
/// Pending-write set for one logical cache.
///
/// At most one pending write is kept per key; a newer entry supersedes the
/// older one. A pass takes the whole pending set and records the flush time
/// before any write is issued, so interleaved callers cannot start a second
/// pass inside the same interval.
pub struct WriteBackScheduler<T> {
    store: Arc<dyn DurableStore>,
    flush_interval_secs: u64,
    durable_ttl_secs: u64,
    state: Mutex<SchedulerState<T>>,
}

impl<T: Serialize> WriteBackScheduler<T> {
    // == Constructor ==
    /// Creates a scheduler whose first pass becomes due one flush interval
    /// after `started_at`.
    ///
    /// # Arguments
    /// * `store` - Durable store receiving the writes
    /// * `flush_interval_secs` - Minimum time between two passes
    /// * `durable_ttl_secs` - TTL passed to every `put`
    /// * `started_at` - Instant treated as the previous flush
    pub fn new(
        store: Arc<dyn DurableStore>,
        flush_interval_secs: u64,
        durable_ttl_secs: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            flush_interval_secs,
            durable_ttl_secs,
            state: Mutex::new(SchedulerState {
                pending: HashMap::new(),
                last_flush_at: started_at,
                flushes: 0,
                flushed_entries: 0,
                flush_failures: 0,
            }),
        }
    }

    pub fn flush_interval_secs(&self) -> u64 {
        self.flush_interval_secs
    }

    // == Record Dirty ==
    /// Queues an entry for the next pass, replacing any pending write for
    /// the same key.
    pub async fn record_dirty(&self, entry: CacheEntry<T>, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state
            .pending
            .insert(entry.key.clone(), PendingWrite::new(entry, now));
    }

    /// Number of entries waiting for a pass.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Pending entry for `key`, if any.
    pub async fn pending(&self, key: &str) -> Option<PendingWrite<T>>
    where
        T: Clone,
    {
        self.state.lock().await.pending.get(key).cloned()
    }

    // == Take Due ==
    /// Takes the pending set if a flush interval has elapsed since the last
    /// pass, marking `now` as the flush time. Returns None when not due.
    pub async fn take_due(&self, now: DateTime<Utc>) -> Option<Vec<PendingWrite<T>>> {
        let mut state = self.state.lock().await;
        if now - state.last_flush_at < seconds(self.flush_interval_secs) {
            return None;
        }
        Some(Self::take_locked(&mut state, now))
    }

    /// Takes the pending set unconditionally, marking `now` as the flush time.
    pub async fn take_all(&self, now: DateTime<Utc>) -> Vec<PendingWrite<T>> {
        let mut state = self.state.lock().await;
        Self::take_locked(&mut state, now)
    }

    fn take_locked(state: &mut SchedulerState<T>, now: DateTime<Utc>) -> Vec<PendingWrite<T>> {
        state.last_flush_at = now;
        state.flushes += 1;

        let mut batch: Vec<PendingWrite<T>> = state.pending.drain().map(|(_, w)| w).collect();
        batch.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.key().cmp(b.key()))
        });
        batch
    }

    // == Persist ==
    /// Writes a batch sequentially. A failed entry is logged and dropped;
    /// the remaining entries are still attempted. Nothing is retried.
    pub async fn persist(&self, batch: Vec<PendingWrite<T>>) -> FlushReport {
        let mut report = FlushReport {
            attempted: batch.len(),
            ..FlushReport::default()
        };

        for pending in batch {
            let key = pending.key();
            let bytes = match pending.entry.to_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(key, error = %e, "Write-back: failed to encode entry, discarding");
                    report.failed += 1;
                    continue;
                }
            };

            match self.store.put(key, bytes, self.durable_ttl_secs).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(key, error = %e, "Write-back: durable put failed, discarding");
                    report.failed += 1;
                }
            }
        }

        {
            let mut state = self.state.lock().await;
            state.flushed_entries += report.written as u64;
            state.flush_failures += report.failed as u64;
        }

        debug!(
            attempted = report.attempted,
            written = report.written,
            failed = report.failed,
            "Write-back pass complete"
        );
        report
    }

    // == Maybe Flush ==
    /// Runs a pass if one is due. Returns None when the interval has not
    /// elapsed yet.
    pub async fn maybe_flush(&self, now: DateTime<Utc>) -> Option<FlushReport> {
        let batch = self.take_due(now).await?;
        Some(self.persist(batch).await)
    }

    // == Flush Pending ==
    /// Runs a pass regardless of the interval.
    pub async fn flush_pending(&self, now: DateTime<Utc>) -> FlushReport {
        let batch = self.take_all(now).await;
        self.persist(batch).await
    }

    /// Copies write-back counters into `stats`.
    pub async fn fill_stats(&self, stats: &mut CacheStats) {
        let state = self.state.lock().await;
        stats.flushes = state.flushes;
        stats.flushed_entries = state.flushed_entries;
        stats.flush_failures = state.flush_failures;
        stats.pending_writes = state.pending.len();
    }
}
