//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance flush: writes pending cache entries on a fixed period

mod flush;

pub use flush::spawn_flush_task;
