//! API Module
//!
//! HTTP handlers and routing for the cache service REST API.
//!
//! # Endpoints
//! - `GET /news`, `GET /quotes` - Cached market-data lookups
//! - `DELETE /cache/news`, `DELETE /cache/quotes` - Hot-tier invalidation
//! - `POST /cache/flush` - Explicit write-back
//! - `POST /throttle`, `DELETE /throttle/:key` - Notification throttling
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
