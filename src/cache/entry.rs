//! Cache Entry Module
//!
//! Defines a captured query result and the freshness arithmetic around it.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

// == Cache Entry ==
/// One captured query result with its capture metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value
    pub data: T,
    /// Capture timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Byte length of the JSON-serialized value, informational only
    pub size: Option<usize>,
    /// Write sequence number, breaks timestamp ties in eviction order
    pub seq: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Captures a value at `timestamp`, measuring its serialized size.
    ///
    /// Values that fail to serialize are still cached, with `size` left unset.
    pub fn capture(data: T, timestamp: u64, seq: u64) -> Self
    where
        T: Serialize,
    {
        let size = serde_json::to_vec(&data).ok().map(|bytes| bytes.len());
        Self {
            data,
            timestamp,
            size,
            seq,
        }
    }

    // == Age ==
    /// Milliseconds since capture. A clock that moved backwards yields zero.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    // == Is Stale ==
    /// Returns true once the age exceeds `ttl * early_refresh_fraction`.
    ///
    /// The boundary itself is still fresh: an entry is stale only when the
    /// age is strictly greater than the threshold.
    pub fn is_stale(&self, now_ms: u64, ttl: Duration, early_refresh_fraction: f64) -> bool {
        let threshold = ttl.as_millis() as f64 * early_refresh_fraction;
        self.age_ms(now_ms) as f64 > threshold
    }

    // == Info ==
    /// Diagnostic snapshot of this entry.
    pub fn info(&self, name: &str, now_ms: u64) -> EntryInfo {
        EntryInfo {
            name: name.to_string(),
            captured_at: timestamp_to_datetime(self.timestamp),
            age_ms: self.age_ms(now_ms),
            size: self.size,
        }
    }
}

// == Entry Info ==
/// Read-only view of an entry's metadata, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Query name the entry is stored under
    pub name: String,
    /// Wall-clock capture time
    pub captured_at: DateTime<Utc>,
    /// Age at the time the snapshot was taken
    pub age_ms: u64,
    /// Serialized size in bytes, if known
    pub size: Option<usize>,
}

fn timestamp_to_datetime(timestamp_ms: u64) -> DateTime<Utc> {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_default()
}
