//! Typed identifiers for entities.
//!
//! `EntityId` is `#[repr(transparent)]` + `Copy`, so wrapping the raw
//! primitive costs nothing at runtime — the compiler enforces type
//! boundaries at zero cost.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Entity identifier (u64), allocated by the store.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<u64>().map(EntityId)
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// The eight entity kinds of the data model.
///
/// The collection name (`Things`, `Observations`, ...) is what appears in
/// request paths and self-links.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum EntityType {
    Thing,
    Location,
    HistoricalLocation,
    Sensor,
    ObservedProperty,
    Datastream,
    Observation,
    FeatureOfInterest,
}

impl EntityType {
    /// All entity types, in collection-endpoint order.
    pub const ALL: [EntityType; 8] = [
        EntityType::Thing,
        EntityType::Location,
        EntityType::HistoricalLocation,
        EntityType::Sensor,
        EntityType::ObservedProperty,
        EntityType::Datastream,
        EntityType::Observation,
        EntityType::FeatureOfInterest,
    ];

    /// Plural collection name as used in paths and links.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Thing => "Things",
            EntityType::Location => "Locations",
            EntityType::HistoricalLocation => "HistoricalLocations",
            EntityType::Sensor => "Sensors",
            EntityType::ObservedProperty => "ObservedProperties",
            EntityType::Datastream => "Datastreams",
            EntityType::Observation => "Observations",
            EntityType::FeatureOfInterest => "FeaturesOfInterest",
        }
    }

    /// Parse a collection name (`"Things"`, `"Observations"`, ...).
    pub fn from_collection(name: &str) -> Option<Self> {
        EntityType::ALL.into_iter().find(|t| t.collection() == name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id: EntityId = "42".parse().unwrap();
        assert_eq!(id, EntityId(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_collection_names_roundtrip() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_collection(t.collection()), Some(t));
        }
        assert_eq!(EntityType::from_collection("Widgets"), None);
    }
}
