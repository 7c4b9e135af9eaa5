//! Error types for the query cache
//!
//! Provides unified error handling using thiserror. Producer errors are
//! never wrapped in these; they pass through `cached_query` untouched.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache construction and configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

// == Result Type Alias ==
/// Convenience Result type for the query cache.
pub type Result<T> = std::result::Result<T, CacheError>;
