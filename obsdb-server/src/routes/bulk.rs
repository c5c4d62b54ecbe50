//! Bulk creation endpoint.
//!
//! `POST /v1/CreateObservations` with the compact array encoding. The batch
//! commits as one unit: any row failure returns the complete per-row error
//! list (HTTP 400, code `validation/rows`) with nothing written.

use crate::error::Result;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use obsdb_ingest::BulkRequest;
use obsdb_store::CancelFlag;
use std::sync::Arc;

pub async fn create_observations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.bulk.ingest(request, &CancelFlag::new())?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
