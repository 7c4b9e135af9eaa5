//! Configuration Module
//!
//! Handles loading cache tuning parameters from environment variables and
//! the per-query options callers pass to `cached_query`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default capacity before eviction kicks in.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default TTL applied when a query does not specify one (1 hour).
pub const DEFAULT_TTL_MS: u64 = 3_600_000;

/// Default share of the TTL after which an entry is refreshed in the background.
pub const DEFAULT_EARLY_REFRESH_FRACTION: f64 = 0.8;

/// Default share of entries dropped when capacity is exceeded.
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.2;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of distinct query names held at once
    pub max_entries: usize,
    /// TTL used when `QueryOptions::ttl` is not set
    pub default_ttl: Duration,
    /// An entry is stale once its age exceeds `ttl * early_refresh_fraction`
    pub early_refresh_fraction: f64,
    /// Share of entries removed (oldest capture first) on overflow
    pub eviction_fraction: f64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Capacity (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 3600000)
    /// - `CACHE_EARLY_REFRESH_FRACTION` - Refresh threshold (default: 0.8)
    /// - `CACHE_EVICTION_FRACTION` - Eviction share (default: 0.2)
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            max_entries: parse_or(&lookup, "CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES),
            default_ttl: Duration::from_millis(parse_or(
                &lookup,
                "CACHE_DEFAULT_TTL_MS",
                DEFAULT_TTL_MS,
            )),
            early_refresh_fraction: parse_or(
                &lookup,
                "CACHE_EARLY_REFRESH_FRACTION",
                DEFAULT_EARLY_REFRESH_FRACTION,
            ),
            eviction_fraction: parse_or(
                &lookup,
                "CACHE_EVICTION_FRACTION",
                DEFAULT_EVICTION_FRACTION,
            ),
        }
    }

    // == Validate ==
    /// Checks that every parameter is within its usable range.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }
        if !in_unit_range(self.early_refresh_fraction) {
            return Err(CacheError::InvalidConfig(format!(
                "early_refresh_fraction must be in (0, 1], got {}",
                self.early_refresh_fraction
            )));
        }
        if !in_unit_range(self.eviction_fraction) {
            return Err(CacheError::InvalidConfig(format!(
                "eviction_fraction must be in (0, 1], got {}",
                self.eviction_fraction
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            early_refresh_fraction: DEFAULT_EARLY_REFRESH_FRACTION,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
        }
    }
}

// == Query Options ==
/// Per-call options for `QueryCache::cached_query`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Time-to-live; `None` uses the cache's default TTL
    pub ttl: Option<Duration>,
}

impl QueryOptions {
    /// Options with an explicit TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    /// Options with an explicit TTL in milliseconds.
    pub fn with_ttl_ms(ttl_ms: u64) -> Self {
        Self::with_ttl(Duration::from_millis(ttl_ms))
    }

    /// Resolves the effective TTL against a config.
    pub fn effective_ttl(&self, config: &CacheConfig) -> Duration {
        self.ttl.unwrap_or(config.default_ttl)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn in_unit_range(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.default_ttl, Duration::from_millis(3_600_000));
        assert_eq!(config.early_refresh_fraction, 0.8);
        assert_eq!(config.eviction_fraction, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup_defaults() {
        let config = CacheConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_config_from_lookup_overrides() {
        let config = CacheConfig::from_lookup(lookup_from(&[
            ("CACHE_MAX_ENTRIES", "50"),
            ("CACHE_DEFAULT_TTL_MS", "7200000"),
            ("CACHE_EARLY_REFRESH_FRACTION", "0.5"),
            ("CACHE_EVICTION_FRACTION", " 0.25 "),
        ]));
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.default_ttl, Duration::from_secs(7200));
        assert_eq!(config.early_refresh_fraction, 0.5);
        assert_eq!(config.eviction_fraction, 0.25);
    }

    #[test]
    fn test_config_unparsable_values_fall_back() {
        let config = CacheConfig::from_lookup(lookup_from(&[
            ("CACHE_MAX_ENTRIES", "lots"),
            ("CACHE_DEFAULT_TTL_MS", "-1"),
        ]));
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.default_ttl, Duration::from_millis(DEFAULT_TTL_MS));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = CacheConfig {
            default_ttl: Duration::ZERO,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_fractions_out_of_range() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let config = CacheConfig {
                early_refresh_fraction: bad,
                ..CacheConfig::default()
            };
            assert!(config.validate().is_err(), "accepted refresh fraction {}", bad);

            let config = CacheConfig {
                eviction_fraction: bad,
                ..CacheConfig::default()
            };
            assert!(config.validate().is_err(), "accepted eviction fraction {}", bad);
        }
    }

    #[test]
    fn test_query_options_effective_ttl() {
        let config = CacheConfig::default();
        assert_eq!(
            QueryOptions::default().effective_ttl(&config),
            config.default_ttl
        );
        assert_eq!(
            QueryOptions::with_ttl_ms(1000).effective_ttl(&config),
            Duration::from_secs(1)
        );
    }
}
