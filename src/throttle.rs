//! Notification Throttle Module
//!
//! Fixed-window gate that suppresses repeat notifications for the same
//! event and recipient. Purely in-memory: a restart forgets every record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::cache::seconds;

/// Suppression window for repeat notifications, in seconds.
pub const DEFAULT_THROTTLE_WINDOW: u64 = 5 * 60;

// == Throttle Record ==
/// Last time the gate opened for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleRecord {
    pub key: String,
    pub last_fired_at: DateTime<Utc>,
}

// == Throttle Guard ==
/// Per-process record of when each key last fired.
///
/// A record's presence alone never means "throttled"; its age is checked
/// against the window on every call. Records are kept until cleared or the
/// process exits.
#[derive(Debug, Default)]
pub struct ThrottleGuard {
    records: HashMap<String, ThrottleRecord>,
}

impl ThrottleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    // == Should Fire ==
    /// Returns true if `key` has never fired, or last fired at least
    /// `window_secs` before `now`.
    pub fn should_fire(&self, key: &str, window_secs: u64, now: DateTime<Utc>) -> bool {
        match self.records.get(key) {
            None => true,
            Some(record) => now - record.last_fired_at >= seconds(window_secs),
        }
    }

    // == Mark Fired ==
    /// Records that `key` fired at `now`, overwriting any earlier record.
    pub fn mark_fired(&mut self, key: &str, now: DateTime<Utc>) {
        self.records.insert(
            key.to_string(),
            ThrottleRecord {
                key: key.to_string(),
                last_fired_at: now,
            },
        );
    }

    /// Checks and marks in one step. Returns true if the caller should send.
    pub fn try_fire(&mut self, key: &str, window_secs: u64, now: DateTime<Utc>) -> bool {
        if !self.should_fire(key, window_secs, now) {
            return false;
        }
        self.mark_fired(key, now);
        true
    }

    // == Clear ==
    /// Forgets `key`; its next check fires. Returns true if a record existed.
    pub fn clear(&mut self, key: &str) -> bool {
        self.records.remove(key).is_some()
    }

    pub fn record(&self, key: &str) -> Option<&ThrottleRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Builds the throttle key for an event class sent to one recipient.
pub fn throttle_key(event: &str, recipient: &str) -> String {
    format!("{}:{}", event, recipient)
}
