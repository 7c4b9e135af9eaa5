//! Cache Statistics Module
//!
//! Tracks hit, miss, refresh and eviction counters for diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time copy of the diagnostic counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Fresh hits served straight from memory
    pub hits: u64,
    /// Hits served past the refresh threshold
    pub stale_hits: u64,
    /// Lookups that found no entry
    pub misses: u64,
    /// Background refreshes started
    pub refreshes: u64,
    /// Background refreshes whose producer failed
    pub refresh_failures: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Total Requests ==
    /// Every `cached_query` call counts exactly once.
    pub fn total_requests(&self) -> u64 {
        self.hits + self.stale_hits + self.misses
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate, stale hits included.
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.stale_hits) as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Live counters, updated without taking the cache lock.
#[derive(Debug, Default)]
pub struct StatsCounters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCounters {
    // == Constructor ==
    /// Creates counters starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Increments the fresh hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Stale Hit ==
    /// Increments the stale hit counter.
    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Refresh ==
    /// Increments the background refresh counter.
    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Refresh Failure ==
    /// Increments the failed refresh counter.
    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Evictions ==
    /// Adds `count` to the eviction counter.
    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters out, with the given entry count.
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
