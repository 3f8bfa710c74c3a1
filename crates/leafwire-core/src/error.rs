//! Error types for leafwire.

use thiserror::Error;

/// Result type alias using leafwire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for leafwire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Zone not found
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// Source not found
    #[error("Source not found: {0}")]
    SourceNotFound(uuid::Uuid),

    /// Geocoding call failed (transport or provider error, not "unresolvable")
    #[error("Geocode error: {0}")]
    Geocode(String),

    /// Source discovery call failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Deal extraction call failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Ingestion pipeline error
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication/authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
