//! Collection, entity, and navigation endpoints.
//!
//! `GET /v1/{Collection}` — paged, filterable list
//! `POST /v1/{Collection}` — create
//! `GET/PATCH/DELETE /v1/{Collection}({id})` — entity operations
//! `GET /v1/{Collection}({id})/{Related}` — navigation (collection or
//! single-valued)
//! `POST /v1/Things({id})/Locations` — create-or-link a location (records a
//! historical location through the link event)
//! `POST /v1/Datastreams({id})/Observations` — create an observation under
//! the datastream

use super::{parse_segment, singular_navigation};
use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use obsdb_core::{EntityId, EntityType, LinkContext};
use obsdb_query::QueryOptions;
use obsdb_store::{CancelFlag, Entity, PagedResult};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Build `QueryOptions` from `$`-prefixed request parameters.
fn query_options(params: &HashMap<String, String>) -> Result<QueryOptions> {
    let mut options = QueryOptions::new();

    if let Some(filter) = params.get("$filter") {
        options.filter = Some(filter.clone());
    }
    if let Some(top) = params.get("$top") {
        options.top = Some(
            top.parse()
                .map_err(|_| ServerError::bad_request("$top must be a non-negative integer"))?,
        );
    }
    if let Some(skip) = params.get("$skip") {
        options.skip = Some(
            skip.parse()
                .map_err(|_| ServerError::bad_request("$skip must be a non-negative integer"))?,
        );
    }
    if let Some(count) = params.get("$count") {
        options.count = match count.as_str() {
            "true" => true,
            "false" => false,
            _ => return Err(ServerError::bad_request("$count must be true or false")),
        };
    }
    if let Some(orderby) = params.get("$orderby") {
        options.order_by = QueryOptions::parse_order_by(orderby)
            .map_err(|e| ServerError::Store(e.into()))?;
    }
    if let Some(select) = params.get("$select") {
        options.select = QueryOptions::parse_property_list(select);
    }
    if let Some(expand) = params.get("$expand") {
        options.expand = QueryOptions::parse_property_list(expand);
    }
    Ok(options)
}

/// Shape one entity for the response: self-link, `$select` projection,
/// `$expand` embedding.
fn shape_entity(
    state: &AppState,
    entity: &Entity,
    options: &QueryOptions,
    links: &LinkContext,
) -> JsonValue {
    let mut value = entity.to_json(links);

    if !options.expand.is_empty() {
        if let Some(obj) = value.as_object_mut() {
            for name in &options.expand {
                if let Some(embedded) = expand_navigation(state, entity, name, links) {
                    obj.insert(name.clone(), embedded);
                }
            }
        }
    }

    if !options.select.is_empty() {
        if let Some(obj) = value.as_object_mut() {
            let keep: Vec<String> = options
                .select
                .iter()
                .cloned()
                .chain(std::iter::once("selfLink".to_string()))
                .chain(options.expand.iter().cloned())
                .collect();
            obj.retain(|k, _| keep.iter().any(|s| s == k));
        }
    }

    value
}

/// Resolve one `$expand` name against an entity: single-valued navigations
/// embed an object, collections embed a default-paged array.
fn expand_navigation(
    state: &AppState,
    entity: &Entity,
    name: &str,
    links: &LinkContext,
) -> Option<JsonValue> {
    if let Some(target) = singular_navigation(name) {
        let related = state
            .repo
            .get_related(entity.entity_type(), entity.id(), target)
            .ok()?;
        return Some(related.to_json(links));
    }

    let target = EntityType::from_collection(name)?;
    let page = state
        .repo
        .list_related(
            entity.entity_type(),
            entity.id(),
            target,
            &QueryOptions::default(),
            &CancelFlag::new(),
        )
        .ok()?;
    Some(JsonValue::Array(
        page.items.iter().map(|e| e.to_json(links)).collect(),
    ))
}

/// Render a collection page: `value`, optional `count`, optional `nextLink`.
fn page_response(
    state: &AppState,
    page: &PagedResult,
    collection_path: &str,
    options: &QueryOptions,
    links: &LinkContext,
) -> JsonValue {
    let value: Vec<JsonValue> = page
        .items
        .iter()
        .map(|e| shape_entity(state, e, options, links))
        .collect();

    let mut body = json!({ "value": value });
    if let Some(count) = page.total_count {
        body["count"] = json!(count);
    }
    if let Some(next) =
        links.next_link(collection_path, page.page_size, page.skip, page.items.len())
    {
        body["nextLink"] = json!(next);
    }
    body
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /v1/{Collection}` or `GET /v1/{Collection}({id})`
pub async fn get_segment(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let (entity_type, id) = parse_segment(&segment)?;
    let options = query_options(&params)?;
    let links = state.links();

    match id {
        Some(id) => {
            let entity = state.repo.get(entity_type, id)?;
            Ok(Json(shape_entity(&state, &entity, &options, &links)))
        }
        None => {
            let page = state
                .repo
                .list(entity_type, &options, &CancelFlag::new())?;
            Ok(Json(page_response(
                &state,
                &page,
                entity_type.collection(),
                &options,
                &links,
            )))
        }
    }
}

/// `POST /v1/{Collection}`
pub async fn create_entity(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let (entity_type, id) = parse_segment(&segment)?;
    if id.is_some() {
        return Err(ServerError::bad_request(
            "POST targets a collection, not an entity",
        ));
    }

    let entity = create_from_json(&state, entity_type, body)?;
    let links = state.links();
    Ok((
        StatusCode::CREATED,
        Json(entity.to_json(&links)),
    ))
}

fn create_from_json(
    state: &AppState,
    entity_type: EntityType,
    body: JsonValue,
) -> Result<Entity> {
    let invalid = |e: serde_json::Error| ServerError::Store(obsdb_store::StoreError::validation(e.to_string()));
    Ok(match entity_type {
        EntityType::Thing => Entity::Thing(
            state
                .repo
                .create_thing(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::Location => Entity::Location(
            state
                .repo
                .create_location(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::Sensor => Entity::Sensor(
            state
                .repo
                .create_sensor(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::ObservedProperty => Entity::ObservedProperty(
            state
                .repo
                .create_observed_property(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::Datastream => Entity::Datastream(
            state
                .repo
                .create_datastream(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::Observation => Entity::Observation(
            state
                .repo
                .create_observation(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::FeatureOfInterest => Entity::FeatureOfInterest(
            state
                .repo
                .create_feature(serde_json::from_value(body).map_err(invalid)?)?,
        ),
        EntityType::HistoricalLocation => {
            return Err(ServerError::bad_request(
                "HistoricalLocations are derived records and cannot be created directly",
            ))
        }
    })
}

/// `PATCH /v1/{Collection}({id})`
pub async fn patch_entity(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let (entity_type, id) = parse_segment(&segment)?;
    let id = id.ok_or_else(|| ServerError::bad_request("PATCH requires an entity id"))?;
    let entity = state.repo.update(entity_type, id, body)?;
    let links = state.links();
    Ok(Json(entity.to_json(&links)))
}

/// `DELETE /v1/{Collection}({id})`
pub async fn delete_entity(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
) -> Result<impl IntoResponse> {
    let (entity_type, id) = parse_segment(&segment)?;
    let id = id.ok_or_else(|| ServerError::bad_request("DELETE requires an entity id"))?;
    state.repo.delete(entity_type, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/{Collection}({id})/{Related}`
pub async fn get_related(
    State(state): State<Arc<AppState>>,
    Path((segment, related)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let (entity_type, id) = parse_segment(&segment)?;
    let id = id.ok_or_else(|| ServerError::bad_request("navigation requires an entity id"))?;
    let options = query_options(&params)?;
    let links = state.links();

    // Single-valued navigation: `Observations(1)/Datastream`.
    if let Some(target) = singular_navigation(&related) {
        let entity = state.repo.get_related(entity_type, id, target)?;
        return Ok(Json(shape_entity(&state, &entity, &options, &links)));
    }

    let target = EntityType::from_collection(&related)
        .ok_or_else(|| ServerError::not_found(format!("unknown navigation '{}'", related)))?;
    let page = state
        .repo
        .list_related(entity_type, id, target, &options, &CancelFlag::new())?;
    let path = format!("{}({})/{}", entity_type.collection(), id, target.collection());
    Ok(Json(page_response(&state, &page, &path, &options, &links)))
}

/// `POST /v1/{Collection}({id})/{Related}` — nested creation, linking, and
/// the sync endpoint (`Things({id})/sync`, delegated to `routes::sync`).
pub async fn post_related(
    State(state): State<Arc<AppState>>,
    Path((segment, related)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
    Json(body): Json<JsonValue>,
) -> Result<axum::response::Response> {
    let (entity_type, id) = parse_segment(&segment)?;
    let id = id.ok_or_else(|| ServerError::bad_request("navigation requires an entity id"))?;
    let links = state.links();

    match (entity_type, related.as_str()) {
        (EntityType::Thing, "sync") => {
            super::sync::sync_thing(&state, id, &headers, body).map(|r| r.into_response())
        }
        // Link an existing location ({"id": n}) or create-and-link.
        (EntityType::Thing, "Locations") => {
            let link_only = body
                .get("id")
                .and_then(|v| v.as_u64())
                .filter(|_| body.as_object().map(|o| o.len()) == Some(1));
            let location_id = match link_only {
                Some(existing) => EntityId(existing),
                None => create_from_json(&state, EntityType::Location, body)?.id(),
            };
            let snapshot = state.repo.link_thing_location(id, location_id)?;
            Ok((
                StatusCode::CREATED,
                Json(Entity::HistoricalLocation(snapshot).to_json(&links)),
            )
                .into_response())
        }
        (EntityType::Datastream, "Observations") => {
            let mut body = body;
            if let Some(obj) = body.as_object_mut() {
                obj.insert("datastreamId".to_string(), json!(id));
            }
            let created = create_from_json(&state, EntityType::Observation, body)?;
            Ok((StatusCode::CREATED, Json(created.to_json(&links))).into_response())
        }
        _ => Err(ServerError::not_found(format!(
            "cannot POST to {}({})/{}",
            entity_type, id, related
        ))),
    }
}
