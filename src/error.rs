//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its collaborators.
///
/// A missing or expired key is not an error: lookups return `Option`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid constructor or configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// `refresh` was called for a key with no registered refresher
    #[error("No refresher registered for key: {key}")]
    MissingRefresher { key: String },

    /// The registered refresher itself failed
    #[error("Refresher failed for key {key}: {source}")]
    RefresherExecution {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// One or more keys failed during a bulk refresh
    #[error("{} of {attempted} refreshes failed", .failures.len())]
    PartialRefresh {
        attempted: usize,
        failures: Vec<CacheError>,
    },

    /// A value could not be encoded or decoded as JSON
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage key rejected by a persistence adapter
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Persistence adapter failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Background work was requested outside a tokio runtime
    #[error("No tokio runtime available to run background refresh")]
    NoRuntime,
}

impl CacheError {
    /// Builds a `MissingRefresher` error from any debuggable key.
    pub(crate) fn missing_refresher<K: std::fmt::Debug>(key: &K) -> Self {
        CacheError::MissingRefresher {
            key: format!("{:?}", key),
        }
    }

    /// Wraps a refresher failure with the key it was refreshing.
    pub(crate) fn refresher_failed<K: std::fmt::Debug>(key: &K, source: anyhow::Error) -> Self {
        CacheError::RefresherExecution {
            key: format!("{:?}", key),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
