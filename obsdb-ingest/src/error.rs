//! Error types for the ingestion paths.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// A row-scoped decoding or validation failure, reported with the index of
/// the offending row so clients can fix and resubmit precisely.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Request-level validation failure (bad component list, oversized
    /// batch, unknown datastream).
    #[error("{0}")]
    Validation(String),

    /// One or more rows failed validation; nothing was written.
    #[error("{} row(s) failed validation", errors.len())]
    RowErrors { errors: Vec<RowError> },

    #[error(transparent)]
    Store(#[from] obsdb_store::StoreError),

    /// Cancelled before the commit began; nothing was written.
    #[error("ingestion cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn validation(msg: impl Into<String>) -> Self {
        IngestError::Validation(msg.into())
    }
}
