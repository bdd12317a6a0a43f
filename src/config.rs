//! Configuration Module
//!
//! Loads server and per-cache cadence settings from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::{CacheSettings, DEFAULT_DURABLE_TTL};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Seconds a news snapshot is served before refetching
    pub news_polling_interval: u64,
    /// Minimum seconds between news write-back passes
    pub news_flush_interval: u64,
    /// Seconds a quote snapshot is served before refetching
    pub quote_polling_interval: u64,
    /// Minimum seconds between quote write-back passes
    pub quote_flush_interval: u64,
    /// TTL in seconds for durable writes
    pub durable_ttl: u64,
    /// Sled database path; None keeps the durable tier in memory
    pub durable_path: Option<String>,
    /// Base URL of the market-data provider
    pub upstream_base_url: String,
    pub upstream_api_key: Option<String>,
    /// Seconds between maintenance flushes; 0 disables the task
    pub maintenance_flush_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `NEWS_POLLING_INTERVAL` - News freshness threshold (default: 300)
    /// - `NEWS_FLUSH_INTERVAL` - News write-back cadence (default: 60)
    /// - `QUOTE_POLLING_INTERVAL` - Quote freshness threshold (default: 60)
    /// - `QUOTE_FLUSH_INTERVAL` - Quote write-back cadence (default: 60)
    /// - `DURABLE_TTL` - Durable entry TTL (default: 86400)
    /// - `DURABLE_PATH` - Sled database path (default: unset, in-memory)
    /// - `UPSTREAM_BASE_URL` - Provider URL (default: http://127.0.0.1:9000)
    /// - `UPSTREAM_API_KEY` - Provider token (default: unset)
    /// - `MAINTENANCE_FLUSH_INTERVAL` - Maintenance flush period (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parsed("SERVER_PORT", defaults.server_port),
            news_polling_interval: parsed("NEWS_POLLING_INTERVAL", defaults.news_polling_interval),
            news_flush_interval: parsed("NEWS_FLUSH_INTERVAL", defaults.news_flush_interval),
            quote_polling_interval: parsed("QUOTE_POLLING_INTERVAL", defaults.quote_polling_interval),
            quote_flush_interval: parsed("QUOTE_FLUSH_INTERVAL", defaults.quote_flush_interval),
            durable_ttl: parsed("DURABLE_TTL", defaults.durable_ttl),
            durable_path: non_empty("DURABLE_PATH"),
            upstream_base_url: non_empty("UPSTREAM_BASE_URL").unwrap_or(defaults.upstream_base_url),
            upstream_api_key: non_empty("UPSTREAM_API_KEY"),
            maintenance_flush_interval: parsed(
                "MAINTENANCE_FLUSH_INTERVAL",
                defaults.maintenance_flush_interval,
            ),
        }
    }

    /// Cadences for the news cache.
    pub fn news_settings(&self) -> CacheSettings {
        CacheSettings::new(self.news_polling_interval, self.news_flush_interval)
            .with_durable_ttl(self.durable_ttl)
    }

    /// Cadences for the quotes cache.
    pub fn quote_settings(&self) -> CacheSettings {
        CacheSettings::new(self.quote_polling_interval, self.quote_flush_interval)
            .with_durable_ttl(self.durable_ttl)
    }
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            news_polling_interval: 300,
            news_flush_interval: 60,
            quote_polling_interval: 60,
            quote_flush_interval: 60,
            durable_ttl: DEFAULT_DURABLE_TTL,
            durable_path: None,
            upstream_base_url: "http://127.0.0.1:9000".to_string(),
            upstream_api_key: None,
            maintenance_flush_interval: 0,
        }
    }
}
