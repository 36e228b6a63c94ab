//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = EhrTokError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, IO, or vocabulary operations.
#[derive(Debug, Error)]
pub enum EhrTokError {
    /// Sampler or vocabulary configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Serialization or deserialization failure, including unknown `type` discriminators.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// An event's code has vocabulary entries but none of its partitions match
    /// the event's value/unit combination.
    #[error("no matching partition for code {code}: {detail}")]
    NoMatchingPartition {
        /// Clinical code carried by the offending event.
        code: String,
        /// Human-readable description of the mismatch.
        detail: String,
    },
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for EhrTokError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl EhrTokError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }
}
