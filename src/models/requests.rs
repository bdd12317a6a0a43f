//! Request DTOs for the cache service API
//!
//! Defines query strings and bodies accepted by the handlers, and how they
//! map onto logical cache queries.

use serde::Deserialize;

use crate::cache::LogicalQuery;

/// Query string for `GET /news` and `DELETE /cache/news`
///
/// # Fields
/// - `symbols`: Comma-separated ticker symbols
/// - `from` / `to`: Optional date bounds passed through to the provider
#[derive(Debug, Clone, Deserialize)]
pub struct NewsParams {
    pub symbols: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl NewsParams {
    /// Normalized query; filter order is fixed so keys stay stable.
    pub fn to_query(&self) -> LogicalQuery {
        LogicalQuery::from_symbol_list(&self.symbols)
            .with_filter("from", self.from.clone())
            .with_filter("to", self.to.clone())
    }
}

/// Query string for `GET /quotes` and `DELETE /cache/quotes`
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteParams {
    pub symbols: String,
}

impl QuoteParams {
    pub fn to_query(&self) -> LogicalQuery {
        LogicalQuery::from_symbol_list(&self.symbols)
    }
}

/// Request body for `POST /throttle`
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleRequest {
    /// Event class, e.g. `price_alert`
    pub event: String,
    /// Recipient identifier, e.g. a user id or push token
    pub recipient: String,
}

impl ThrottleRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.event.trim().is_empty() {
            return Some("Event cannot be empty".to_string());
        }
        if self.recipient.trim().is_empty() {
            return Some("Recipient cannot be empty".to_string());
        }
        None
    }
}
