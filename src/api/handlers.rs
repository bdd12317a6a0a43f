//! API Handlers
//!
//! HTTP request handlers for the market-data cache endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::cache::{DurableStore, LogicalQuery, TieredCache};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    ClearThrottleResponse, FlushResponse, HealthResponse, InvalidateResponse, LookupResponse,
    NewsParams, QuoteParams, StatsResponse, ThrottleRequest, ThrottleResponse,
};
use crate::throttle::{throttle_key, ThrottleGuard, DEFAULT_THROTTLE_WINDOW};
use crate::upstream::MarketData;

/// Application state shared across all handlers.
///
/// Built once at startup; every handler sees the same caches and throttle.
#[derive(Clone)]
pub struct AppState {
    pub news: Arc<TieredCache<Value>>,
    pub quotes: Arc<TieredCache<Value>>,
    pub throttle: Arc<Mutex<ThrottleGuard>>,
    pub upstream: Arc<dyn MarketData>,
}

impl AppState {
    /// Creates a new AppState from already constructed caches.
    pub fn new(
        news: TieredCache<Value>,
        quotes: TieredCache<Value>,
        upstream: Arc<dyn MarketData>,
    ) -> Self {
        Self {
            news: Arc::new(news),
            quotes: Arc::new(quotes),
            throttle: Arc::new(Mutex::new(ThrottleGuard::new())),
            upstream,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Both caches share the durable store under different namespaces.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn DurableStore>,
        upstream: Arc<dyn MarketData>,
    ) -> Self {
        let news = TieredCache::new("news", config.news_settings(), store.clone());
        let quotes = TieredCache::new("quotes", config.quote_settings(), store);
        Self::new(news, quotes, upstream)
    }
}

fn require_symbols(query: &LogicalQuery) -> Result<()> {
    if query.is_empty() {
        return Err(ApiError::InvalidRequest(
            "At least one symbol is required".to_string(),
        ));
    }
    Ok(())
}

/// Handler for GET /news
///
/// Serves news for a symbol set, from cache when fresh enough.
pub async fn news_handler(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Result<Json<LookupResponse>> {
    let query = params.to_query();
    require_symbols(&query)?;

    let upstream = state.upstream.clone();
    let lookup = state
        .news
        .lookup(&query, || upstream.news(&query))
        .await
        .map_err(|e| {
            warn!(symbols = %query.joined_symbols(), error = %e, "News fetch failed");
            ApiError::from(e)
        })?;

    Ok(Json(lookup.into()))
}

/// Handler for GET /quotes
pub async fn quotes_handler(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<LookupResponse>> {
    let query = params.to_query();
    require_symbols(&query)?;

    let upstream = state.upstream.clone();
    let lookup = state
        .quotes
        .lookup(&query, || upstream.quotes(&query))
        .await
        .map_err(|e| {
            warn!(symbols = %query.joined_symbols(), error = %e, "Quote fetch failed");
            ApiError::from(e)
        })?;

    Ok(Json(lookup.into()))
}

/// Handler for DELETE /cache/news
///
/// Drops the hot entry only; the durable copy expires on its own.
pub async fn invalidate_news_handler(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Json<InvalidateResponse> {
    let query = params.to_query();
    let removed = state.news.invalidate(&query).await;
    Json(InvalidateResponse {
        key: state.news.key_for(&query),
        removed,
    })
}

/// Handler for DELETE /cache/quotes
pub async fn invalidate_quotes_handler(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Json<InvalidateResponse> {
    let query = params.to_query();
    let removed = state.quotes.invalidate(&query).await;
    Json(InvalidateResponse {
        key: state.quotes.key_for(&query),
        removed,
    })
}

/// Handler for POST /cache/flush
///
/// Writes every pending entry of both caches to the durable store now.
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let news = state.news.flush_pending().await;
    let quotes = state.quotes.flush_pending().await;
    Json(FlushResponse::new(news, quotes))
}

/// Handler for POST /throttle
///
/// Answers whether a notification may be sent now; a positive answer
/// opens a new suppression window for the same event and recipient.
pub async fn throttle_handler(
    State(state): State<AppState>,
    Json(req): Json<ThrottleRequest>,
) -> Result<Json<ThrottleResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let key = throttle_key(&req.event, &req.recipient);
    let fire = state
        .throttle
        .lock()
        .await
        .try_fire(&key, DEFAULT_THROTTLE_WINDOW, Utc::now());

    Ok(Json(ThrottleResponse {
        key,
        fire,
        window_secs: DEFAULT_THROTTLE_WINDOW,
    }))
}

/// Handler for DELETE /throttle/:key
pub async fn clear_throttle_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ClearThrottleResponse>> {
    if !state.throttle.lock().await.clear(&key) {
        return Err(ApiError::NotFound(key));
    }
    Ok(Json(ClearThrottleResponse::new(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        news: state.news.stats().await.into(),
        quotes: state.quotes.stats().await.into(),
        throttle_records: state.throttle.lock().await.len(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
