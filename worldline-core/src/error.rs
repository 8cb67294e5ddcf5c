//! Error types for the worldline core library.
//!
//! The transition function never fails; these errors only surface from
//! configuration loading and (de)serialization helpers.

use thiserror::Error;

/// Top-level error type for worldline core operations.
#[derive(Error, Debug)]
pub enum WorldlineError {
    /// Configuration could not be parsed or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A snapshot with the given ID does not exist.
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// A transition descriptor could not be decoded.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for WorldlineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, WorldlineError>;
