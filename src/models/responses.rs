//! Response DTOs for the cache service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, FlushReport, Lookup};

/// Response body for `GET /news` and `GET /quotes`
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    pub key: String,
    /// True when no upstream call was made
    pub from_cache: bool,
    /// When the payload was fetched from upstream
    pub captured_at: DateTime<Utc>,
    pub data: Value,
}

impl From<Lookup<Value>> for LookupResponse {
    fn from(lookup: Lookup<Value>) -> Self {
        Self {
            key: lookup.key,
            from_cache: lookup.from_cache,
            captured_at: lookup.captured_at,
            data: lookup.payload,
        }
    }
}

/// Response body for `DELETE /cache/...`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub key: String,
    /// Whether a hot entry was present
    pub removed: bool,
}

/// Response body for `POST /cache/flush`
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub news: FlushReport,
    pub quotes: FlushReport,
    pub total: FlushReport,
}

impl FlushResponse {
    pub fn new(news: FlushReport, quotes: FlushReport) -> Self {
        let mut total = news;
        total.merge(quotes);
        Self {
            news,
            quotes,
            total,
        }
    }
}

/// Response body for `POST /throttle`
#[derive(Debug, Clone, Serialize)]
pub struct ThrottleResponse {
    pub key: String,
    /// True if the caller should send the notification now
    pub fire: bool,
    pub window_secs: u64,
}

/// Response body for `DELETE /throttle/:key`
#[derive(Debug, Clone, Serialize)]
pub struct ClearThrottleResponse {
    pub message: String,
    pub key: String,
}

impl ClearThrottleResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Throttle for '{}' cleared", key),
            key,
        }
    }
}

/// Counters for one cache plus its hit rate (hits / lookups)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub counters: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(counters: CacheStats) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            counters,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub news: CacheStatsResponse,
    pub quotes: CacheStatsResponse,
    /// Keys currently held by the notification throttle
    pub throttle_records: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
