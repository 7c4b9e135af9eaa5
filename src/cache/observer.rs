//! Observer Module
//!
//! Injectable hook for cache diagnostics. The default implementation logs
//! through `tracing`; tests can plug in a recorder instead of reading logs.

use std::fmt::Display;

use tracing::{debug, info, warn};

// == Cache Observer ==
/// Receives cache events. Every method defaults to a no-op.
///
/// Callbacks run after the cache lock is released, so an implementation may
/// block briefly or call back into the cache without stalling other callers.
pub trait CacheObserver: Send + Sync {
    /// Fresh entry served from memory.
    fn on_hit(&self, _name: &str, _age_ms: u64) {}

    /// Stale entry served while a refresh runs (or is already running).
    fn on_stale_hit(&self, _name: &str, _age_ms: u64) {}

    /// No entry; the caller waits for a fetch.
    fn on_miss(&self, _name: &str) {}

    /// A fetch completed and its result was stored.
    fn on_stored(&self, _name: &str, _size: Option<usize>) {}

    /// A background refresh failed; the existing entry was kept.
    fn on_refresh_failed(&self, _name: &str, _error: &dyn Display) {}

    /// Entries dropped by capacity eviction.
    fn on_evicted(&self, _names: &[String]) {}
}

// == Noop Observer ==
/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}

// == Tracing Observer ==
/// Logs cache events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_hit(&self, name: &str, age_ms: u64) {
        debug!(query = name, age_ms, "Cache hit");
    }

    fn on_stale_hit(&self, name: &str, age_ms: u64) {
        debug!(query = name, age_ms, "Stale cache hit, refreshing in background");
    }

    fn on_miss(&self, name: &str) {
        debug!(query = name, "Cache miss");
    }

    fn on_stored(&self, name: &str, size: Option<usize>) {
        debug!(query = name, size = ?size, "Cached query result");
    }

    fn on_refresh_failed(&self, name: &str, error: &dyn Display) {
        warn!(query = name, error = %error, "Background refresh failed, keeping stale entry");
    }

    fn on_evicted(&self, names: &[String]) {
        info!(count = names.len(), "Cache over capacity, evicted oldest entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observers_accept_every_event() {
        let observers: [&dyn CacheObserver; 2] = [&NoopObserver, &TracingObserver];
        for observer in observers {
            observer.on_hit("categories", 10);
            observer.on_stale_hit("categories", 900);
            observer.on_miss("sites");
            observer.on_stored("sites", Some(42));
            observer.on_refresh_failed("sites", &"connection reset");
            observer.on_evicted(&["old".to_string()]);
        }
    }
}
