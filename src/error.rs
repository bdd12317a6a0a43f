//! Error types for the cache service
//!
//! Durable-layer failures stay inside the cache core; API errors are what
//! handlers turn into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Failure talking to a durable store.
///
/// The cache core never propagates these: a failed read is a miss and a
/// failed write is a discarded pending entry.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation
    #[error("Durable store unavailable: {0}")]
    Unavailable(String),

    /// Stored bytes do not have the expected shape
    #[error("Corrupted record for key {0}")]
    Corrupted(String),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),
}

// == API Error Enum ==
/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The upstream market-data provider failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Upstream(format!("{:#}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Result type for durable store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
