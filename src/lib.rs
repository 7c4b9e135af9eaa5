//! AI Nav Query Cache - server-side memoization of database reads
//!
//! Serves cached query results, refreshes them in the background once they
//! age past a share of their TTL, and bounds memory with capture-order
//! eviction.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;

pub use cache::{QueryCache, QueryCacheBuilder};
pub use config::{CacheConfig, QueryOptions};
pub use error::CacheError;
