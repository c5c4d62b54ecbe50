//! Route registration and request-path helpers.
//!
//! Entity addressing uses the `{Collection}({id})` convention inside a
//! single path segment (`/v1/Things(7)/Datastreams`), so the router captures
//! whole segments and `parse_segment` splits them.

pub mod bulk;
pub mod collections;
pub mod health;
pub mod sync;

use crate::error::ServerError;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use obsdb_core::{EntityId, EntityType};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/CreateObservations", post(bulk::create_observations))
        .route(
            "/v1/{segment}",
            get(collections::get_segment)
                .post(collections::create_entity)
                .patch(collections::patch_entity)
                .delete(collections::delete_entity),
        )
        .route(
            "/v1/{segment}/{related}",
            get(collections::get_related).post(collections::post_related),
        )
        .with_state(state)
}

/// Parse a path segment: `Things` → (Thing, None);
/// `Things(7)` → (Thing, Some(7)).
pub fn parse_segment(segment: &str) -> Result<(EntityType, Option<EntityId>), ServerError> {
    let (name, id) = match segment.find('(') {
        Some(open) => {
            if !segment.ends_with(')') {
                return Err(ServerError::bad_request(format!(
                    "malformed entity address '{}'",
                    segment
                )));
            }
            let id_text = &segment[open + 1..segment.len() - 1];
            let id: EntityId = id_text.parse().map_err(|_| {
                ServerError::bad_request(format!("invalid entity id '{}'", id_text))
            })?;
            (&segment[..open], Some(id))
        }
        None => (segment, None),
    };

    let entity_type = EntityType::from_collection(name)
        .ok_or_else(|| ServerError::not_found(format!("unknown collection '{}'", name)))?;
    Ok((entity_type, id))
}

/// Singular navigation names (`Observations(1)/Datastream`).
pub fn singular_navigation(name: &str) -> Option<EntityType> {
    match name {
        "Thing" => Some(EntityType::Thing),
        "Sensor" => Some(EntityType::Sensor),
        "ObservedProperty" => Some(EntityType::ObservedProperty),
        "Datastream" => Some(EntityType::Datastream),
        "FeatureOfInterest" => Some(EntityType::FeatureOfInterest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection_segment() {
        let (t, id) = parse_segment("Things").unwrap();
        assert_eq!(t, EntityType::Thing);
        assert!(id.is_none());
    }

    #[test]
    fn test_parse_entity_segment() {
        let (t, id) = parse_segment("Observations(42)").unwrap();
        assert_eq!(t, EntityType::Observation);
        assert_eq!(id, Some(EntityId(42)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_segment("Things(7").is_err());
        assert!(parse_segment("Things(x)").is_err());
        assert!(parse_segment("Widgets").is_err());
    }
}
