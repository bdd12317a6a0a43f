//! Sled Store Module
//!
//! On-disk durable store so cached snapshots survive a process restart.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;

use crate::cache::{seconds, DurableStore};
use crate::error::{StoreError, StoreResult};

/// Length of the big-endian expiry prefix on every stored value.
const EXPIRY_PREFIX_LEN: usize = 8;

// == Sled Store ==
/// Durable store backed by a local sled database.
///
/// Each value is stored as an 8-byte big-endian expiry (Unix milliseconds)
/// followed by the raw bytes. Expired keys are removed when read.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Opens (or creates) the database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn encode(value: &[u8], ttl_secs: u64) -> Vec<u8> {
        let expires_at_ms = Utc::now()
            .checked_add_signed(seconds(ttl_secs))
            .map(|t| t.timestamp_millis())
            .unwrap_or(i64::MAX);

        let mut record = Vec::with_capacity(EXPIRY_PREFIX_LEN + value.len());
        record.extend_from_slice(&expires_at_ms.to_be_bytes());
        record.extend_from_slice(value);
        record
    }
}

#[async_trait]
impl DurableStore for SledStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let db = self.db.clone();
        let key = key.to_string();
        blocking(move || read_live(&db, &key)).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()> {
        let db = self.db.clone();
        let key = key.to_string();
        blocking(move || {
            db.insert(key.as_bytes(), SledStore::encode(&value, ttl_secs))?;
            Ok(())
        })
        .await
    }
}

// == Blocking Helpers ==
// sled may touch the disk on any call, so calls run on the blocking pool.
async fn blocking<R, F>(op: F) -> StoreResult<R>
where
    R: Send + 'static,
    F: FnOnce() -> StoreResult<R> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Durable task failed: {}", e)))?
}

/// Returns the value for `key` unless its record has expired, in which case
/// the record is removed.
fn read_live(db: &sled::Db, key: &str) -> StoreResult<Option<Vec<u8>>> {
    let Some(record) = db.get(key.as_bytes())? else {
        return Ok(None);
    };

    if record.len() < EXPIRY_PREFIX_LEN {
        return Err(StoreError::Corrupted(key.to_string()));
    }

    let (prefix, value) = record.split_at(EXPIRY_PREFIX_LEN);
    let mut expiry = [0u8; EXPIRY_PREFIX_LEN];
    expiry.copy_from_slice(prefix);
    let expires_at_ms = i64::from_be_bytes(expiry);

    if Utc::now().timestamp_millis() >= expires_at_ms {
        remove_if_unchanged(db, key, &record)?;
        return Ok(None);
    }

    Ok(Some(value.to_vec()))
}

/// Removes `key` only while it still holds `record`. A write that landed
/// after the read is kept. Returns whether the record was removed.
fn remove_if_unchanged(db: &sled::Db, key: &str, record: &sled::IVec) -> StoreResult<bool> {
    let swapped = db.compare_and_swap(key.as_bytes(), Some(record), None::<&[u8]>)?;
    Ok(swapped.is_ok())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("cache.sled")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_sled_store_put_and_get() {
        let (_dir, store) = open_temp();
        store.put("news:AAPL", b"payload".to_vec(), 60).await.unwrap();

        let value = store.get("news:AAPL").await.unwrap();
        assert_eq!(value, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn test_sled_store_missing_key() {
        let (_dir, store) = open_temp();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_store_expired_key_is_removed() {
        let (_dir, store) = open_temp();
        store.put("k", b"v".to_vec(), 0).await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.db.get(b"k").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_store_expiry_keeps_newer_write() {
        let (_dir, store) = open_temp();
        store.put("k", b"old".to_vec(), 0).await.unwrap();
        let stale = store.db.get(b"k").unwrap().unwrap();

        // A fresh write lands between the read and the removal.
        store.put("k", b"new".to_vec(), 60).await.unwrap();

        assert!(!remove_if_unchanged(&store.db, "k", &stale).unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_sled_store_remove_if_unchanged() {
        let (_dir, store) = open_temp();
        store.db.insert(b"k", &b"record"[..]).unwrap();
        let record = store.db.get(b"k").unwrap().unwrap();

        assert!(remove_if_unchanged(&store.db, "k", &record).unwrap());
        assert!(store.db.get(b"k").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_store_short_record_is_corrupted() {
        let (_dir, store) = open_temp();
        store.db.insert(b"bad", &b"abc"[..]).unwrap();

        let result = store.get("bad").await;
        assert!(matches!(result, Err(StoreError::Corrupted(key)) if key == "bad"));
    }

    #[tokio::test]
    async fn test_sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sled");

        {
            let store = SledStore::open(&path).unwrap();
            store.put("quotes:MSFT", b"410".to_vec(), 3600).await.unwrap();
            store.db.flush().unwrap();
        }

        let reopened = SledStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("quotes:MSFT").await.unwrap(),
            Some(b"410".to_vec())
        );
    }
}
