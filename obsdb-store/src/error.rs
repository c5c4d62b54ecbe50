//! Error types for obsdb-store

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store error type.
///
/// Core taxonomy errors (validation, not-found, conflict, authorization)
/// pass through from `obsdb_core::Error`; filter compilation errors pass
/// through from `obsdb_query::FilterError` so the server can distinguish
/// syntax from unsupported-function failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] obsdb_core::Error),

    #[error(transparent)]
    Filter(#[from] obsdb_query::FilterError),

    /// The caller's cancellation flag was raised mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Core(obsdb_core::Error::validation(msg))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StoreError::Core(obsdb_core::Error::not_found(msg))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        StoreError::Core(obsdb_core::Error::conflict(msg))
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        StoreError::Core(obsdb_core::Error::authorization(msg))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        StoreError::Internal(msg.into())
    }

    /// True for the not-found passthrough (used by handlers mapping to 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Core(obsdb_core::Error::NotFound(_)))
    }
}
