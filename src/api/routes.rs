//! API Routes
//!
//! Configures the Axum router with all cache service endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_throttle_handler, flush_handler, health_handler, invalidate_news_handler,
    invalidate_quotes_handler, news_handler, quotes_handler, stats_handler, throttle_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /news` - News for a symbol set (cached)
/// - `GET /quotes` - Quotes for a symbol set (cached)
/// - `DELETE /cache/news`, `DELETE /cache/quotes` - Drop a hot entry
/// - `POST /cache/flush` - Write all pending entries to the durable store
/// - `POST /throttle` - Ask whether a notification may be sent
/// - `DELETE /throttle/:key` - Reset a notification throttle
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/news", get(news_handler))
        .route("/quotes", get(quotes_handler))
        .route("/cache/news", delete(invalidate_news_handler))
        .route("/cache/quotes", delete(invalidate_quotes_handler))
        .route("/cache/flush", post(flush_handler))
        .route("/throttle", post(throttle_handler))
        .route("/throttle/:key", delete(clear_throttle_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
