//! Maintenance Flush Task
//!
//! Optional background task that writes pending entries on a fixed period,
//! for deployments where request traffic alone may leave entries unflushed
//! for long stretches.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TieredCache;

/// Spawns a task that calls `flush_pending` on `cache` every
/// `interval_secs` seconds.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_flush_task<T>(cache: Arc<TieredCache<T>>, interval_secs: u64) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting maintenance flush for '{}' every {} seconds",
            cache.namespace(),
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let report = cache.flush_pending().await;
            if report.attempted > 0 {
                info!(
                    "Maintenance flush '{}': wrote {} of {} pending entries",
                    cache.namespace(),
                    report.written,
                    report.attempted
                );
            } else {
                debug!("Maintenance flush '{}': nothing pending", cache.namespace());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, LogicalQuery, MemoryStore};

    #[tokio::test]
    async fn test_flush_task_writes_pending_entries() {
        let store = Arc::new(MemoryStore::new());
        let settings = CacheSettings::new(300, 3600).with_background_flush(false);
        let cache = Arc::new(TieredCache::<String>::new("news", settings, store.clone()));

        cache
            .lookup(&LogicalQuery::new(["AAPL"]), || async {
                Ok::<_, String>("v".to_string())
            })
            .await
            .unwrap();
        assert_eq!(cache.stats().await.pending_writes, 1);

        let handle = spawn_flush_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.stats().await.pending_writes, 0);
        assert_eq!(store.len().await, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_flush_task_can_be_aborted() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(TieredCache::<String>::new(
            "news",
            CacheSettings::new(300, 60),
            store,
        ));
        let handle = spawn_flush_task(cache, 1);

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
