//! Entity tables and link rows.
//!
//! One `RwLock`-guarded map per entity type; CRUD is low-frequency, so
//! short exclusive sections are sufficient (the read-committed analogue:
//! readers never block readers, and no lock is held across a request).
//!
//! The feature geometry index maps a WKT equality key to candidate feature
//! ids. Its mutex is the serialization point for get-or-create: two
//! concurrent callers with the same geometry cannot both insert.

use obsdb_core::{
    Datastream, EntityId, FeatureOfInterest, GeometryValue, HistoricalLocation, Location,
    ObservedProperty, Sensor, Thing,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct EntityTables {
    next_id: AtomicU64,
    pub things: RwLock<FxHashMap<EntityId, Thing>>,
    pub locations: RwLock<FxHashMap<EntityId, Location>>,
    pub historical_locations: RwLock<FxHashMap<EntityId, HistoricalLocation>>,
    pub sensors: RwLock<FxHashMap<EntityId, Sensor>>,
    pub observed_properties: RwLock<FxHashMap<EntityId, ObservedProperty>>,
    pub datastreams: RwLock<FxHashMap<EntityId, Datastream>>,
    pub features: RwLock<FxHashMap<EntityId, FeatureOfInterest>>,
    /// Thing–Location links (many-to-many).
    pub thing_locations: RwLock<Vec<(EntityId, EntityId)>>,
    /// Geometry equality key → candidate feature ids. Guards get-or-create.
    feature_index: Mutex<FxHashMap<u64, Vec<EntityId>>>,
}

impl EntityTables {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Allocate the next entity identity.
    pub fn allocate_id(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Look up an existing feature with exactly this geometry, or insert the
    /// candidate built by `make`. The index mutex is held across lookup and
    /// insert, so at most one feature exists per distinct geometry even
    /// under concurrent callers; the loser of the race receives the
    /// winner's identity.
    pub fn feature_by_geometry_or_insert(
        &self,
        geometry: &GeometryValue,
        make: impl FnOnce(EntityId) -> FeatureOfInterest,
    ) -> (EntityId, bool) {
        let key = geometry.equality_key();
        let mut index = self.feature_index.lock();

        if let Some(candidates) = index.get(&key) {
            let features = self.features.read();
            for id in candidates {
                if let Some(existing) = features.get(id) {
                    // Hash collisions are resolved by exact comparison.
                    if existing.geometry.eq_exact(geometry) {
                        return (*id, false);
                    }
                }
            }
        }

        let id = self.allocate_id();
        self.features.write().insert(id, make(id));
        index.entry(key).or_default().push(id);
        (id, true)
    }

    /// Remove a feature from the geometry index (on delete).
    pub fn unindex_feature(&self, feature: &FeatureOfInterest) {
        let key = feature.geometry.equality_key();
        let mut index = self.feature_index.lock();
        if let Some(candidates) = index.get_mut(&key) {
            candidates.retain(|id| *id != feature.id);
            if candidates.is_empty() {
                index.remove(&key);
            }
        }
    }

    /// Locations linked to a thing, in link order.
    pub fn locations_of_thing(&self, thing_id: EntityId) -> Vec<EntityId> {
        self.thing_locations
            .read()
            .iter()
            .filter(|(t, _)| *t == thing_id)
            .map(|(_, l)| *l)
            .collect()
    }

    /// Things linked to a location.
    pub fn things_of_location(&self, location_id: EntityId) -> Vec<EntityId> {
        self.thing_locations
            .read()
            .iter()
            .filter(|(_, l)| *l == location_id)
            .map(|(t, _)| *t)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: EntityId, wkt: &str) -> FeatureOfInterest {
        FeatureOfInterest {
            id,
            name: "f".into(),
            description: String::new(),
            encoding_type: "application/wkt".into(),
            geometry: GeometryValue::parse(wkt).unwrap(),
        }
    }

    #[test]
    fn test_allocate_ids_are_distinct() {
        let t = EntityTables::new();
        assert_ne!(t.allocate_id(), t.allocate_id());
    }

    #[test]
    fn test_feature_get_or_create_dedups() {
        let t = EntityTables::new();
        let g = GeometryValue::parse("POINT(8 51)").unwrap();

        let (id1, created1) = t.feature_by_geometry_or_insert(&g, |id| feature(id, "POINT(8 51)"));
        let (id2, created2) = t.feature_by_geometry_or_insert(&g, |id| feature(id, "POINT(8 51)"));

        assert!(created1);
        assert!(!created2);
        assert_eq!(id1, id2);
        assert_eq!(t.features.read().len(), 1);
    }

    #[test]
    fn test_feature_equality_is_exact_not_tolerant() {
        let t = EntityTables::new();
        let a = GeometryValue::parse("POINT(8 51)").unwrap();
        let b = GeometryValue::parse("POINT(8.0 51.0)").unwrap();

        let (id1, _) = t.feature_by_geometry_or_insert(&a, |id| feature(id, "POINT(8 51)"));
        let (id2, _) = t.feature_by_geometry_or_insert(&b, |id| feature(id, "POINT(8.0 51.0)"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_concurrent_get_or_create_converges() {
        use std::sync::Arc;

        let tables = Arc::new(EntityTables::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tables = tables.clone();
            handles.push(std::thread::spawn(move || {
                let g = GeometryValue::parse("POINT(8 51)").unwrap();
                tables
                    .feature_by_geometry_or_insert(&g, |id| feature(id, "POINT(8 51)"))
                    .0
            }));
        }
        let ids: Vec<EntityId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(tables.features.read().len(), 1);
    }

    #[test]
    fn test_thing_location_links() {
        let t = EntityTables::new();
        t.thing_locations.write().push((EntityId(1), EntityId(10)));
        t.thing_locations.write().push((EntityId(1), EntityId(11)));
        t.thing_locations.write().push((EntityId(2), EntityId(10)));

        assert_eq!(t.locations_of_thing(EntityId(1)), vec![EntityId(10), EntityId(11)]);
        assert_eq!(t.things_of_location(EntityId(10)), vec![EntityId(1), EntityId(2)]);
    }
}
