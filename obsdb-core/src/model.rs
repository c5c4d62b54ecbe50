//! Entity records for the observation data model.
//!
//! Things, Sensors, and ObservedProperties are created rarely and read
//! often; Observations are created at very high frequency and never updated
//! in the common path; HistoricalLocations are a derived, append-only audit
//! trail.
//!
//! Relationship fields hold `EntityId`s, never embedded entities. Derived
//! fields on `Datastream` (time extents, observed area) are refreshed by a
//! background task and may lag the newest observations by a bounded window.

use crate::geometry::{BBox, GeometryValue};
use crate::ids::EntityId;
use crate::temporal::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A monitored entity (device, site, or mobile unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    /// Free-form property bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,
    /// Shared secret presented by mobile clients on the sync endpoint.
    /// Never serialized into responses.
    #[serde(skip_serializing, default)]
    pub sync_key: Option<String>,
}

/// A geometry with its encoding, linked to one or more Things.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    /// Encoding label for the stored geometry text (e.g. `application/wkt`).
    pub encoding_type: String,
    pub geometry: GeometryValue,
}

/// Immutable snapshot created whenever a Thing–Location link is established.
///
/// Never mutated; deleted only by retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalLocation {
    #[serde(default)]
    pub id: EntityId,
    pub thing_id: EntityId,
    pub time: Timestamp,
    pub location_ids: Vec<EntityId>,
}

/// Measurement procedure description, referenced by Datastreams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub encoding_type: String,
    pub metadata: String,
}

/// Observed phenomenon description, referenced by Datastreams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedProperty {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub definition: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfMeasurement {
    pub name: String,
    pub symbol: String,
    pub definition: String,
}

/// The binding of one Thing + one Sensor + one ObservedProperty + a unit.
///
/// The derived extents are always ⊇ the extents of the datastream's
/// observations, eventually — not immediately — consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub thing_id: EntityId,
    pub sensor_id: EntityId,
    pub observed_property_id: EntityId,
    pub unit_of_measurement: UnitOfMeasurement,
    /// Observation type label (e.g. a measurement vs. a category result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time_start: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time_end: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_time_start: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_time_end: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_area: Option<BBox>,
}

/// The real-world object or location an Observation describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOfInterest {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub encoding_type: String,
    pub geometry: GeometryValue,
}

/// Polymorphic observation result.
///
/// A tagged variant in memory; serialized untagged so the wire form is the
/// plain JSON value (number, string, boolean, or structured object/array).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Structured(JsonValue),
}

impl ResultValue {
    /// Build from an arbitrary JSON value, collapsing scalars to their
    /// tagged variants and keeping everything else structured.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Bool(b) => ResultValue::Bool(b),
            JsonValue::Number(n) => match n.as_f64() {
                Some(f) => ResultValue::Number(f),
                None => ResultValue::Structured(JsonValue::Number(n)),
            },
            JsonValue::String(s) => ResultValue::Text(s),
            other => ResultValue::Structured(other),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResultValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResultValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for ResultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResultValue::Bool(a), ResultValue::Bool(b)) => a == b,
            (ResultValue::Number(a), ResultValue::Number(b)) => a == b,
            (ResultValue::Text(a), ResultValue::Text(b)) => a == b,
            (ResultValue::Structured(a), ResultValue::Structured(b)) => a == b,
            _ => false,
        }
    }
}

/// The atomic fact: one timestamped measurement within a Datastream.
///
/// Immutable once created except for correction patches. `phenomenon_time`
/// is the partition key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub id: EntityId,
    pub datastream_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest_id: Option<EntityId>,
    /// When the phenomenon was measured.
    pub phenomenon_time: Timestamp,
    /// When the result was computed, if distinct from the phenomenon time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_time: Option<Timestamp>,
    pub result: ResultValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonValue>,
    // Mobile bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_batch_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_value_untagged_roundtrip() {
        let n: ResultValue = serde_json::from_str("21.5").unwrap();
        assert_eq!(n, ResultValue::Number(21.5));

        let t: ResultValue = serde_json::from_str("\"dry\"").unwrap();
        assert_eq!(t, ResultValue::Text("dry".into()));

        let b: ResultValue = serde_json::from_str("true").unwrap();
        assert_eq!(b, ResultValue::Bool(true));

        let s: ResultValue = serde_json::from_str(r#"{"r":1,"g":2}"#).unwrap();
        assert!(matches!(s, ResultValue::Structured(_)));
    }

    #[test]
    fn test_result_value_cross_type_inequality() {
        assert_ne!(ResultValue::Number(1.0), ResultValue::Text("1".into()));
        assert_ne!(ResultValue::Bool(true), ResultValue::Number(1.0));
    }

    #[test]
    fn test_thing_sync_key_not_serialized() {
        let thing = Thing {
            id: EntityId(1),
            name: "rover".into(),
            description: "field unit".into(),
            properties: None,
            sync_key: Some("secret".into()),
        };
        let json = serde_json::to_string(&thing).unwrap();
        assert!(!json.contains("secret"));
    }
}
