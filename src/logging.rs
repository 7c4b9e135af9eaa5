//! Logging Module
//!
//! Installs a tracing subscriber for processes hosting the cache.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CacheError, Result};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "ai_nav_cache=info";

/// Initializes the global tracing subscriber.
///
/// Honours `RUST_LOG`, falling back to `default_filter`. Cache hits and misses
/// log at `debug`, evictions at `info` and failed background refreshes at
/// `warn`.
///
/// # Errors
/// Returns `CacheError::Logging` if a global subscriber is already set.
pub fn init(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| CacheError::Logging(e.to_string()))
}

/// Initializes logging for tests (no-op if already initialized).
pub fn init_test() {
    let _ = init("ai_nav_cache=debug");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        init_test();
        assert!(matches!(init(DEFAULT_FILTER), Err(CacheError::Logging(_))));
    }
}
