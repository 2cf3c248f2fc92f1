//! Error types for sojourn-progress
//!
//! Persistence errors never reach the mutation call site; they are logged by
//! the writer. Only `InvalidArgument` is returned synchronously from store
//! operations.

use std::time::Duration;
use thiserror::Error;

/// Main error type for sojourn-progress
#[derive(Error, Debug)]
pub enum Error {
    /// Mutation input rejected before touching the record
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Remote backend requires a signed-in identity
    #[error("Not signed in: remote persistence requires an authenticated user")]
    NotSignedIn,

    /// Backend answered with something unusable
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Save or load exceeded its time bound
    #[error("Persistence timed out after {0:?}")]
    Timeout(Duration),

    /// Local database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Remote backend transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Record encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type using sojourn-progress Error
pub type Result<T> = std::result::Result<T, Error>;
