//! Health endpoint.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "partitions": state.repo.observations().partition_count(),
        "observations": state.repo.observations().row_count(),
    }))
}
