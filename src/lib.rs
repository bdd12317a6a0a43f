//! Tiered Cache - response cache for a stock-tracking backend
//!
//! Shields a rate-limited market-data provider behind an in-memory hot tier
//! and a durable write-back tier, and throttles duplicate notifications.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod throttle;
pub mod upstream;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_flush_task;
