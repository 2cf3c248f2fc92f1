//! Common error types for Sojourn

use thiserror::Error;

/// Common result type for Sojourn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Sojourn crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file present but not parseable
    #[error("Config file {path} is malformed: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration value out of range or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
