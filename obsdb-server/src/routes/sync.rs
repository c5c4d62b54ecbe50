//! Offline sync endpoint: `POST /v1/Things({id})/sync`.
//!
//! The caller must be authorized for the referenced Thing: when the thing
//! has a registered sync key, the `X-Thing-Key` header must match. The
//! response always reflects a committed batch — failures are per item.

use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::http::HeaderMap;
use axum::Json;
use obsdb_core::EntityId;
use obsdb_ingest::{SyncReport, SyncRequest};
use obsdb_store::CancelFlag;
use serde_json::Value as JsonValue;

const THING_KEY_HEADER: &str = "x-thing-key";

pub fn sync_thing(
    state: &AppState,
    thing_id: EntityId,
    headers: &HeaderMap,
    body: JsonValue,
) -> Result<Json<SyncReport>> {
    authorize(state, thing_id, headers)?;

    let mut request: SyncRequest = serde_json::from_value(body)
        .map_err(|e| ServerError::bad_request(format!("invalid sync request: {}", e)))?;
    // The path is authoritative for the thing being synced.
    request.thing_id = thing_id;

    let report = state.sync.sync(request, &CancelFlag::new())?;
    Ok(Json(report))
}

/// Check the thing's registered sync key against the request header.
fn authorize(state: &AppState, thing_id: EntityId, headers: &HeaderMap) -> Result<()> {
    let things = state.repo.tables().things.read();
    let thing = things
        .get(&thing_id)
        .ok_or_else(|| ServerError::not_found(format!("Things({})", thing_id)))?;

    let Some(expected) = &thing.sync_key else {
        // No key registered: the thing accepts unauthenticated sync.
        return Ok(());
    };

    let presented = headers
        .get(THING_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServerError::unauthorized(format!("Things({}) requires X-Thing-Key", thing_id))
        })?;

    if presented != expected {
        return Err(ServerError::unauthorized(format!(
            "X-Thing-Key does not match Things({})",
            thing_id
        )));
    }
    Ok(())
}
