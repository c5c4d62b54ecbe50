//! Server error types with HTTP status code mapping.
//!
//! Every error serializes as `{ "error": ..., "status": ..., "code": ... }`
//! where `code` is a stable machine-readable string. Filter failures carry
//! distinct codes for syntax (`filter/syntax`) and unsupported functions
//! (`filter/unsupported-function`) — callers must be able to tell them
//! apart.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use obsdb_ingest::{IngestError, RowError};
use obsdb_query::FilterError;
use obsdb_store::StoreError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),
}

impl ServerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServerError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ServerError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServerError::NotFound(msg.into())
    }

    /// Stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        use obsdb_core::Error as Core;
        match self {
            ServerError::Store(StoreError::Filter(f)) | ServerError::Ingest(IngestError::Store(StoreError::Filter(f))) => {
                match f {
                    FilterError::UnsupportedFunction { .. } => "filter/unsupported-function",
                    FilterError::UnknownProperty { .. } => "filter/unknown-property",
                    FilterError::Arity { .. } => "filter/syntax",
                    FilterError::Syntax { .. } => "filter/syntax",
                    FilterError::Translate(_) => "filter/syntax",
                }
            }
            ServerError::Store(StoreError::Core(core))
            | ServerError::Ingest(IngestError::Store(StoreError::Core(core))) => match core {
                Core::Validation(_) => "validation",
                Core::NotFound(_) => "not-found",
                Core::Conflict(_) => "conflict",
                Core::Authorization(_) => "authorization",
                Core::Geometry(_) => "validation",
                Core::Temporal(_) => "validation",
                Core::Json(_) => "validation",
                Core::Other(_) => "internal",
            },
            ServerError::Store(StoreError::Cancelled)
            | ServerError::Ingest(IngestError::Cancelled)
            | ServerError::Ingest(IngestError::Store(StoreError::Cancelled)) => "cancelled",
            ServerError::Store(StoreError::Internal(_))
            | ServerError::Ingest(IngestError::Store(StoreError::Internal(_))) => "internal",
            ServerError::Ingest(IngestError::Validation(_)) => "validation",
            ServerError::Ingest(IngestError::RowErrors { .. }) => "validation/rows",
            ServerError::Json(_) => "json-parse",
            ServerError::BadRequest(_) => "bad-request",
            ServerError::Unauthorized(_) => "authorization",
            ServerError::NotFound(_) => "not-found",
        }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        use obsdb_core::Error as Core;
        match self {
            ServerError::Store(StoreError::Filter(_))
            | ServerError::Ingest(IngestError::Store(StoreError::Filter(_))) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Store(StoreError::Core(core))
            | ServerError::Ingest(IngestError::Store(StoreError::Core(core))) => match core {
                Core::NotFound(_) => StatusCode::NOT_FOUND,
                Core::Conflict(_) => StatusCode::CONFLICT,
                Core::Authorization(_) => StatusCode::FORBIDDEN,
                Core::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            // The client went away; 499 is conventional but non-standard.
            ServerError::Store(StoreError::Cancelled)
            | ServerError::Ingest(IngestError::Cancelled)
            | ServerError::Ingest(IngestError::Store(StoreError::Cancelled)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Store(StoreError::Internal(_))
            | ServerError::Ingest(IngestError::Store(StoreError::Internal(_))) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Ingest(IngestError::Validation(_))
            | ServerError::Ingest(IngestError::RowErrors { .. }) => StatusCode::BAD_REQUEST,
            ServerError::Json(_) => StatusCode::BAD_REQUEST,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Row-scoped errors for bulk failures, when present.
    fn row_errors(&self) -> Option<&[RowError]> {
        match self {
            ServerError::Ingest(IngestError::RowErrors { errors }) => Some(errors),
            _ => None,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<RowError>>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
            code: self.error_code().to_string(),
            rows: self.row_errors().map(|r| r.to_vec()),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_codes_are_distinct() {
        let syntax: ServerError =
            StoreError::Filter(FilterError::syntax(3, "bad")).into();
        let unsupported: ServerError =
            StoreError::Filter(FilterError::unsupported("now")).into();
        assert_eq!(syntax.error_code(), "filter/syntax");
        assert_eq!(unsupported.error_code(), "filter/unsupported-function");
        assert_eq!(syntax.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(unsupported.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_taxonomy_status_mapping() {
        let not_found: ServerError = StoreError::not_found("Things(1)").into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict: ServerError = StoreError::conflict("dup").into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let auth: ServerError = StoreError::authorization("nope").into();
        assert_eq!(auth.status_code(), StatusCode::FORBIDDEN);

        let validation: ServerError = StoreError::validation("missing name").into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
    }
}
