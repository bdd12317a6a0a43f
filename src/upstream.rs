//! Upstream Market-Data Module
//!
//! The rate-limited provider the cache shields. Lookups hand one of these
//! calls to the cache as its fetch function.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use crate::cache::LogicalQuery;

// == Market Data Trait ==
#[async_trait]
pub trait MarketData: Send + Sync {
    /// News articles for the query's symbols and filters.
    async fn news(&self, query: &LogicalQuery) -> anyhow::Result<Value>;

    /// Latest quotes for the query's symbols.
    async fn quotes(&self, query: &LogicalQuery) -> anyhow::Result<Value>;
}

// == HTTP Client ==
/// JSON-over-HTTP provider client.
///
/// Requests `GET {base_url}/{resource}?symbols=A,B&<filters>&token=<key>`;
/// unset filters are omitted.
pub struct HttpMarketData {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMarketData {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn params(&self, query: &LogicalQuery) -> Vec<(String, String)> {
        let mut params = vec![("symbols".to_string(), query.joined_symbols())];
        params.extend(
            query
                .filters()
                .iter()
                .filter_map(|f| f.value.clone().map(|v| (f.name.clone(), v))),
        );
        if let Some(key) = &self.api_key {
            params.push(("token".to_string(), key.clone()));
        }
        params
    }

    async fn fetch(&self, resource: &str, query: &LogicalQuery) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, resource);
        let response = self
            .client
            .get(&url)
            .query(&self.params(query))
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Upstream rejected {} request", resource))?;

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Upstream returned invalid JSON for {}", resource))
    }
}

#[async_trait]
impl MarketData for HttpMarketData {
    async fn news(&self, query: &LogicalQuery) -> anyhow::Result<Value> {
        self.fetch("news", query).await
    }

    async fn quotes(&self, query: &LogicalQuery) -> anyhow::Result<Value> {
        self.fetch("quotes", query).await
    }
}
