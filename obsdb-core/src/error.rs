//! Error types for obsdb-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid required field, rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown id or navigation target
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation (e.g. concurrent feature-of-interest creation)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller lacks rights to the referenced entity
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Geometry that does not parse per its encoding
    #[error("Invalid geometry: {0}")]
    Geometry(String),

    /// Timestamp that does not parse
    #[error("Invalid timestamp: {0}")]
    Temporal(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// Create an authorization error
    pub fn authorization(msg: impl Into<String>) -> Self {
        Error::Authorization(msg.into())
    }

    /// Create a geometry error
    pub fn geometry(msg: impl Into<String>) -> Self {
        Error::Geometry(msg.into())
    }

    /// Create a temporal error
    pub fn temporal(msg: impl Into<String>) -> Self {
        Error::Temporal(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
