//! The entity repository: validated CRUD, navigation, and list queries.
//!
//! Every operation executes against the shared tables / observation store
//! with no cross-request mutable state; filter text is compiled by
//! obsdb-query and evaluated here through `exec`. Navigation-property
//! resolution is a foreign-key-scoped list that reuses the same paging and
//! filter machinery as top-level collections.

use crate::cancel::CancelFlag;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::events::{HistoricalLocationRecorder, StoreEvent};
use crate::exec::{EntityFields, Evaluator};
use crate::observations::ObservationStore;
use crate::tables::EntityTables;
use obsdb_core::{
    Datastream, EntityId, EntityType, FeatureOfInterest, GeometryValue, HistoricalLocation,
    LinkContext, Location, Observation, ObservedProperty, Sensor, Thing, Timestamp,
};
use obsdb_query::{
    parse_filter, translate, Column, CompareOp, Operand, ParamValue, QueryOptions, QueryTemplate,
    StoreQuery,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::info;

/// A typed entity row returned from the repository.
#[derive(Debug, Clone)]
pub enum Entity {
    Thing(Thing),
    Location(Location),
    HistoricalLocation(HistoricalLocation),
    Sensor(Sensor),
    ObservedProperty(ObservedProperty),
    Datastream(Datastream),
    Observation(Observation),
    FeatureOfInterest(FeatureOfInterest),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Thing(e) => e.id,
            Entity::Location(e) => e.id,
            Entity::HistoricalLocation(e) => e.id,
            Entity::Sensor(e) => e.id,
            Entity::ObservedProperty(e) => e.id,
            Entity::Datastream(e) => e.id,
            Entity::Observation(e) => e.id,
            Entity::FeatureOfInterest(e) => e.id,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Thing(_) => EntityType::Thing,
            Entity::Location(_) => EntityType::Location,
            Entity::HistoricalLocation(_) => EntityType::HistoricalLocation,
            Entity::Sensor(_) => EntityType::Sensor,
            Entity::ObservedProperty(_) => EntityType::ObservedProperty,
            Entity::Datastream(_) => EntityType::Datastream,
            Entity::Observation(_) => EntityType::Observation,
            Entity::FeatureOfInterest(_) => EntityType::FeatureOfInterest,
        }
    }

    /// Serialize with the self-link computed from the current base path.
    pub fn to_json(&self, links: &LinkContext) -> JsonValue {
        let mut value = match self {
            Entity::Thing(e) => serde_json::to_value(e),
            Entity::Location(e) => serde_json::to_value(e),
            Entity::HistoricalLocation(e) => serde_json::to_value(e),
            Entity::Sensor(e) => serde_json::to_value(e),
            Entity::ObservedProperty(e) => serde_json::to_value(e),
            Entity::Datastream(e) => serde_json::to_value(e),
            Entity::Observation(e) => serde_json::to_value(e),
            Entity::FeatureOfInterest(e) => serde_json::to_value(e),
        }
        .unwrap_or(JsonValue::Null);

        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "selfLink".to_string(),
                json!(links.self_link(self.entity_type(), self.id())),
            );
        }
        value
    }
}

/// One page of a collection query.
#[derive(Debug)]
pub struct PagedResult {
    pub items: Vec<Entity>,
    /// Total matching rows, present when `$count=true` was requested.
    pub total_count: Option<usize>,
    /// The page size that was applied (after server capping).
    pub page_size: usize,
    pub skip: usize,
}

pub struct EntityRepository {
    config: StoreConfig,
    tables: Arc<EntityTables>,
    observations: Arc<ObservationStore>,
    recorder: HistoricalLocationRecorder,
}

impl EntityRepository {
    pub fn new(
        config: StoreConfig,
        tables: Arc<EntityTables>,
        observations: Arc<ObservationStore>,
    ) -> Self {
        let recorder = HistoricalLocationRecorder::new(tables.clone());
        Self {
            config,
            tables,
            observations,
            recorder,
        }
    }

    pub fn tables(&self) -> &Arc<EntityTables> {
        &self.tables
    }

    pub fn observations(&self) -> &Arc<ObservationStore> {
        &self.observations
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub fn create_thing(&self, mut thing: Thing) -> Result<Thing> {
        require_nonempty("name", &thing.name)?;
        thing.id = self.tables.allocate_id();
        self.tables.things.write().insert(thing.id, thing.clone());
        Ok(thing)
    }

    pub fn create_location(&self, mut location: Location) -> Result<Location> {
        require_nonempty("name", &location.name)?;
        require_nonempty("encodingType", &location.encoding_type)?;
        location.id = self.tables.allocate_id();
        self.tables
            .locations
            .write()
            .insert(location.id, location.clone());
        Ok(location)
    }

    pub fn create_sensor(&self, mut sensor: Sensor) -> Result<Sensor> {
        require_nonempty("name", &sensor.name)?;
        sensor.id = self.tables.allocate_id();
        self.tables.sensors.write().insert(sensor.id, sensor.clone());
        Ok(sensor)
    }

    pub fn create_observed_property(&self, mut op: ObservedProperty) -> Result<ObservedProperty> {
        require_nonempty("name", &op.name)?;
        require_nonempty("definition", &op.definition)?;
        op.id = self.tables.allocate_id();
        self.tables
            .observed_properties
            .write()
            .insert(op.id, op.clone());
        Ok(op)
    }

    pub fn create_datastream(&self, mut ds: Datastream) -> Result<Datastream> {
        require_nonempty("name", &ds.name)?;
        if !self.tables.things.read().contains_key(&ds.thing_id) {
            return Err(StoreError::validation(format!(
                "datastream references unknown Thing({})",
                ds.thing_id
            )));
        }
        if !self.tables.sensors.read().contains_key(&ds.sensor_id) {
            return Err(StoreError::validation(format!(
                "datastream references unknown Sensor({})",
                ds.sensor_id
            )));
        }
        if !self
            .tables
            .observed_properties
            .read()
            .contains_key(&ds.observed_property_id)
        {
            return Err(StoreError::validation(format!(
                "datastream references unknown ObservedProperty({})",
                ds.observed_property_id
            )));
        }
        // Derived fields start empty; the extent worker fills them in.
        ds.phenomenon_time_start = None;
        ds.phenomenon_time_end = None;
        ds.result_time_start = None;
        ds.result_time_end = None;
        ds.observed_area = None;
        ds.id = self.tables.allocate_id();
        self.tables.datastreams.write().insert(ds.id, ds.clone());
        Ok(ds)
    }

    pub fn create_feature(&self, mut feature: FeatureOfInterest) -> Result<FeatureOfInterest> {
        require_nonempty("name", &feature.name)?;
        let geometry = feature.geometry.clone();
        let (id, created) = self.tables.feature_by_geometry_or_insert(&geometry, |id| {
            feature.id = id;
            feature.clone()
        });
        if !created {
            // Conflict resolved internally: reuse the existing identity.
            let existing = self.tables.features.read().get(&id).cloned();
            return existing.ok_or_else(|| StoreError::internal("feature index out of sync"));
        }
        self.tables
            .features
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::internal("feature missing after insert"))
    }

    /// Get-or-create by exact spatial equality.
    ///
    /// Safe under concurrent callers racing to create the same feature: the
    /// geometry index serializes lookup+insert, so at most one feature
    /// exists per distinct geometry and the loser reuses the winner's
    /// identity. Equality is exact WKT text equality — conceptually equal
    /// but differently rendered geometries create distinct features (no
    /// tolerance is applied; see DESIGN.md).
    pub fn get_or_create_feature(
        &self,
        name: &str,
        description: &str,
        encoding_type: &str,
        geometry: GeometryValue,
    ) -> Result<(FeatureOfInterest, bool)> {
        let (id, created) = self.tables.feature_by_geometry_or_insert(&geometry, |id| {
            FeatureOfInterest {
                id,
                name: name.to_string(),
                description: description.to_string(),
                encoding_type: encoding_type.to_string(),
                geometry: geometry.clone(),
            }
        });
        let feature = self
            .tables
            .features
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::internal("feature index out of sync"))?;
        Ok((feature, created))
    }

    /// Create a single observation. When no feature of interest is named,
    /// one is derived from the thing's most recent location by
    /// get-or-create.
    pub fn create_observation(&self, mut obs: Observation) -> Result<Observation> {
        let datastream = self
            .tables
            .datastreams
            .read()
            .get(&obs.datastream_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "observation references unknown Datastream({})",
                    obs.datastream_id
                ))
            })?;

        if obs.feature_of_interest_id.is_none() {
            obs.feature_of_interest_id = self.feature_from_thing_location(datastream.thing_id)?;
        } else if let Some(foi) = obs.feature_of_interest_id {
            if !self.tables.features.read().contains_key(&foi) {
                return Err(StoreError::validation(format!(
                    "observation references unknown FeatureOfInterest({})",
                    foi
                )));
            }
        }

        obs.id = self.tables.allocate_id();
        self.observations.insert(obs.clone());
        Ok(obs)
    }

    /// Derive a feature from the thing's most recent linked location.
    fn feature_from_thing_location(&self, thing_id: EntityId) -> Result<Option<EntityId>> {
        let location_ids = self.tables.locations_of_thing(thing_id);
        let Some(last) = location_ids.last() else {
            return Ok(None);
        };
        let Some(location) = self.tables.locations.read().get(last).cloned() else {
            return Ok(None);
        };
        let (feature, _) = self.get_or_create_feature(
            &location.name,
            &location.description,
            &location.encoding_type,
            location.geometry,
        )?;
        Ok(Some(feature.id))
    }

    /// Link a thing and a location, emitting the `LocationLinked` event that
    /// records the historical-location snapshot.
    pub fn link_thing_location(
        &self,
        thing_id: EntityId,
        location_id: EntityId,
    ) -> Result<HistoricalLocation> {
        if !self.tables.things.read().contains_key(&thing_id) {
            return Err(StoreError::not_found(format!("Things({})", thing_id)));
        }
        if !self.tables.locations.read().contains_key(&location_id) {
            return Err(StoreError::not_found(format!("Locations({})", location_id)));
        }
        self.tables
            .thing_locations
            .write()
            .push((thing_id, location_id));

        let event = StoreEvent::LocationLinked {
            thing_id,
            location_id,
            time: Timestamp::now(),
        };
        self.recorder
            .handle(&event)
            .ok_or_else(|| StoreError::internal("link event produced no snapshot"))
    }

    // -----------------------------------------------------------------------
    // Get / Update / Delete
    // -----------------------------------------------------------------------

    pub fn get(&self, entity_type: EntityType, id: EntityId) -> Result<Entity> {
        let found = match entity_type {
            EntityType::Thing => self.tables.things.read().get(&id).cloned().map(Entity::Thing),
            EntityType::Location => self
                .tables
                .locations
                .read()
                .get(&id)
                .cloned()
                .map(Entity::Location),
            EntityType::HistoricalLocation => self
                .tables
                .historical_locations
                .read()
                .get(&id)
                .cloned()
                .map(Entity::HistoricalLocation),
            EntityType::Sensor => self
                .tables
                .sensors
                .read()
                .get(&id)
                .cloned()
                .map(Entity::Sensor),
            EntityType::ObservedProperty => self
                .tables
                .observed_properties
                .read()
                .get(&id)
                .cloned()
                .map(Entity::ObservedProperty),
            EntityType::Datastream => self
                .tables
                .datastreams
                .read()
                .get(&id)
                .cloned()
                .map(Entity::Datastream),
            EntityType::Observation => self.observations.get(id).map(Entity::Observation),
            EntityType::FeatureOfInterest => self
                .tables
                .features
                .read()
                .get(&id)
                .cloned()
                .map(Entity::FeatureOfInterest),
        };
        found.ok_or_else(|| StoreError::not_found(format!("{}({})", entity_type, id)))
    }

    /// Apply a shallow JSON merge patch. The id is immutable; observations
    /// and historical locations are immutable records.
    pub fn update(&self, entity_type: EntityType, id: EntityId, patch: JsonValue) -> Result<Entity> {
        if !patch.is_object() {
            return Err(StoreError::validation("patch body must be a JSON object"));
        }
        match entity_type {
            EntityType::Thing => {
                let current = self.get(entity_type, id)?;
                let mut merged: Thing = self.merge_patch(&current, &patch)?;
                // sync_key never appears in serialized output, so the merge
                // round-trip loses it unless the patch itself sets one.
                if merged.sync_key.is_none() {
                    if let Entity::Thing(cur) = &current {
                        merged.sync_key = cur.sync_key.clone();
                    }
                }
                require_nonempty("name", &merged.name)?;
                self.tables.things.write().insert(id, merged.clone());
                Ok(Entity::Thing(merged))
            }
            EntityType::Location => {
                let merged: Location = self.merge_patch(&self.get(entity_type, id)?, &patch)?;
                require_nonempty("name", &merged.name)?;
                self.tables.locations.write().insert(id, merged.clone());
                Ok(Entity::Location(merged))
            }
            EntityType::Sensor => {
                let merged: Sensor = self.merge_patch(&self.get(entity_type, id)?, &patch)?;
                require_nonempty("name", &merged.name)?;
                self.tables.sensors.write().insert(id, merged.clone());
                Ok(Entity::Sensor(merged))
            }
            EntityType::ObservedProperty => {
                let merged: ObservedProperty =
                    self.merge_patch(&self.get(entity_type, id)?, &patch)?;
                require_nonempty("name", &merged.name)?;
                self.tables
                    .observed_properties
                    .write()
                    .insert(id, merged.clone());
                Ok(Entity::ObservedProperty(merged))
            }
            EntityType::Datastream => {
                let merged: Datastream = self.merge_patch(&self.get(entity_type, id)?, &patch)?;
                require_nonempty("name", &merged.name)?;
                if !self.tables.things.read().contains_key(&merged.thing_id) {
                    return Err(StoreError::validation(format!(
                        "datastream references unknown Thing({})",
                        merged.thing_id
                    )));
                }
                self.tables.datastreams.write().insert(id, merged.clone());
                Ok(Entity::Datastream(merged))
            }
            EntityType::FeatureOfInterest => {
                let merged: FeatureOfInterest =
                    self.merge_patch(&self.get(entity_type, id)?, &patch)?;
                require_nonempty("name", &merged.name)?;
                self.tables.features.write().insert(id, merged.clone());
                Ok(Entity::FeatureOfInterest(merged))
            }
            EntityType::Observation | EntityType::HistoricalLocation => Err(
                StoreError::validation(format!("{} records are immutable", entity_type)),
            ),
        }
    }

    fn merge_patch<T: serde::de::DeserializeOwned>(
        &self,
        current: &Entity,
        patch: &JsonValue,
    ) -> Result<T> {
        let ctx = LinkContext::new("");
        let mut value = current.to_json(&ctx);
        if let (Some(obj), Some(patch_obj)) = (value.as_object_mut(), patch.as_object()) {
            obj.remove("selfLink");
            let id = obj.get("id").cloned();
            for (k, v) in patch_obj {
                if v.is_null() {
                    obj.remove(k);
                } else {
                    obj.insert(k.clone(), v.clone());
                }
            }
            // The identity never changes through a patch.
            if let Some(id) = id {
                obj.insert("id".to_string(), id);
            }
        }
        serde_json::from_value(value).map_err(|e| StoreError::validation(e.to_string()))
    }

    pub fn delete(&self, entity_type: EntityType, id: EntityId) -> Result<()> {
        match entity_type {
            EntityType::Thing => self.delete_thing(id),
            EntityType::Location => self.delete_location(id),
            EntityType::HistoricalLocation => {
                self.tables
                    .historical_locations
                    .write()
                    .remove(&id)
                    .map(|_| ())
                    .ok_or_else(|| StoreError::not_found(format!("HistoricalLocations({})", id)))
            }
            EntityType::Sensor => self.delete_reference_data(
                id,
                &self.tables.sensors,
                |ds: &Datastream| ds.sensor_id == id,
                "Sensor",
            ),
            EntityType::ObservedProperty => self.delete_reference_data(
                id,
                &self.tables.observed_properties,
                |ds: &Datastream| ds.observed_property_id == id,
                "ObservedProperty",
            ),
            EntityType::Datastream => self.delete_datastream(id),
            EntityType::Observation => self
                .observations
                .remove_by_id(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(format!("Observations({})", id))),
            EntityType::FeatureOfInterest => {
                let removed = self.tables.features.write().remove(&id);
                match removed {
                    Some(feature) => {
                        self.tables.unindex_feature(&feature);
                        Ok(())
                    }
                    None => Err(StoreError::not_found(format!("FeaturesOfInterest({})", id))),
                }
            }
        }
    }

    /// Thing deletion cascades to owned datastreams (and their
    /// observations), drops location links, and removes the thing's
    /// historical-location trail.
    fn delete_thing(&self, id: EntityId) -> Result<()> {
        if self.tables.things.write().remove(&id).is_none() {
            return Err(StoreError::not_found(format!("Things({})", id)));
        }
        let owned: Vec<EntityId> = self
            .tables
            .datastreams
            .read()
            .values()
            .filter(|ds| ds.thing_id == id)
            .map(|ds| ds.id)
            .collect();
        for ds_id in owned {
            self.delete_datastream(ds_id)?;
        }
        self.tables
            .thing_locations
            .write()
            .retain(|(thing, _)| *thing != id);
        self.tables
            .historical_locations
            .write()
            .retain(|_, hl| hl.thing_id != id);
        info!(thing = %id, "deleted thing and cascaded to owned datastreams");
        Ok(())
    }

    fn delete_datastream(&self, id: EntityId) -> Result<()> {
        if self.tables.datastreams.write().remove(&id).is_none() {
            return Err(StoreError::not_found(format!("Datastreams({})", id)));
        }
        let removed = self.observations.remove_datastream(id);
        info!(datastream = %id, observations = removed, "deleted datastream");
        Ok(())
    }

    fn delete_location(&self, id: EntityId) -> Result<()> {
        if self.tables.locations.write().remove(&id).is_none() {
            return Err(StoreError::not_found(format!("Locations({})", id)));
        }
        self.tables
            .thing_locations
            .write()
            .retain(|(_, location)| *location != id);
        Ok(())
    }

    /// Reference data (sensors, observed properties) cannot be deleted
    /// while a datastream references it.
    fn delete_reference_data<T>(
        &self,
        id: EntityId,
        table: &parking_lot::RwLock<rustc_hash::FxHashMap<EntityId, T>>,
        in_use: impl Fn(&Datastream) -> bool,
        kind: &str,
    ) -> Result<()> {
        if self.tables.datastreams.read().values().any(in_use) {
            return Err(StoreError::conflict(format!(
                "{}({}) is referenced by existing datastreams",
                kind, id
            )));
        }
        table
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("{}({})", kind, id)))
    }

    // -----------------------------------------------------------------------
    // List queries
    // -----------------------------------------------------------------------

    /// List a top-level collection.
    pub fn list(
        &self,
        entity_type: EntityType,
        options: &QueryOptions,
        cancel: &CancelFlag,
    ) -> Result<PagedResult> {
        self.list_scoped(entity_type, options, cancel, |_| true)
    }

    /// Navigation-property resolution: a list scoped by the parent's
    /// foreign key, reusing the same paging/filter machinery.
    pub fn list_related(
        &self,
        parent_type: EntityType,
        parent_id: EntityId,
        related: EntityType,
        options: &QueryOptions,
        cancel: &CancelFlag,
    ) -> Result<PagedResult> {
        // The parent must exist regardless of how many related rows match.
        self.get(parent_type, parent_id)?;

        match (parent_type, related) {
            (EntityType::Thing, EntityType::Datastream) => {
                self.list_scoped(related, options, cancel, move |e| match e {
                    Entity::Datastream(ds) => ds.thing_id == parent_id,
                    _ => false,
                })
            }
            (EntityType::Thing, EntityType::Location) => {
                let ids = self.tables.locations_of_thing(parent_id);
                self.list_scoped(related, options, cancel, move |e| ids.contains(&e.id()))
            }
            (EntityType::Thing, EntityType::HistoricalLocation) => {
                self.list_scoped(related, options, cancel, move |e| match e {
                    Entity::HistoricalLocation(hl) => hl.thing_id == parent_id,
                    _ => false,
                })
            }
            (EntityType::Location, EntityType::Thing) => {
                let ids = self.tables.things_of_location(parent_id);
                self.list_scoped(related, options, cancel, move |e| ids.contains(&e.id()))
            }
            (EntityType::HistoricalLocation, EntityType::Location) => {
                let ids = match self.get(parent_type, parent_id)? {
                    Entity::HistoricalLocation(hl) => hl.location_ids,
                    _ => Vec::new(),
                };
                self.list_scoped(related, options, cancel, move |e| ids.contains(&e.id()))
            }
            (EntityType::Sensor, EntityType::Datastream) => {
                self.list_scoped(related, options, cancel, move |e| match e {
                    Entity::Datastream(ds) => ds.sensor_id == parent_id,
                    _ => false,
                })
            }
            (EntityType::ObservedProperty, EntityType::Datastream) => {
                self.list_scoped(related, options, cancel, move |e| match e {
                    Entity::Datastream(ds) => ds.observed_property_id == parent_id,
                    _ => false,
                })
            }
            (EntityType::Datastream, EntityType::Observation) => {
                self.list_scoped(related, options, cancel, move |e| match e {
                    Entity::Observation(o) => o.datastream_id == parent_id,
                    _ => false,
                })
            }
            (EntityType::FeatureOfInterest, EntityType::Observation) => {
                self.list_scoped(related, options, cancel, move |e| match e {
                    Entity::Observation(o) => o.feature_of_interest_id == Some(parent_id),
                    _ => false,
                })
            }
            _ => Err(StoreError::not_found(format!(
                "{} has no collection navigation {}",
                parent_type, related
            ))),
        }
    }

    /// Single-valued navigation (`Observations(1)/Datastream`).
    pub fn get_related(
        &self,
        parent_type: EntityType,
        parent_id: EntityId,
        related: EntityType,
    ) -> Result<Entity> {
        let parent = self.get(parent_type, parent_id)?;
        let target = match (&parent, related) {
            (Entity::Observation(o), EntityType::Datastream) => Some(o.datastream_id),
            (Entity::Observation(o), EntityType::FeatureOfInterest) => o.feature_of_interest_id,
            (Entity::Datastream(ds), EntityType::Thing) => Some(ds.thing_id),
            (Entity::Datastream(ds), EntityType::Sensor) => Some(ds.sensor_id),
            (Entity::Datastream(ds), EntityType::ObservedProperty) => {
                Some(ds.observed_property_id)
            }
            (Entity::HistoricalLocation(hl), EntityType::Thing) => Some(hl.thing_id),
            _ => None,
        };
        let target = target.ok_or_else(|| {
            StoreError::not_found(format!(
                "{}({}) has no {} navigation",
                parent_type, parent_id, related
            ))
        })?;
        self.get(related, target)
    }

    fn list_scoped(
        &self,
        entity_type: EntityType,
        options: &QueryOptions,
        cancel: &CancelFlag,
        scope: impl Fn(&Entity) -> bool,
    ) -> Result<PagedResult> {
        // Compile the filter first: a malformed filter fails the request,
        // it never falls back to an unfiltered result.
        let ast = options
            .filter
            .as_deref()
            .map(parse_filter)
            .transpose()?;
        let query = translate(ast.as_ref(), entity_type, options)?;

        let mut rows = self.collect_rows(entity_type, &query, cancel)?;
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        rows.retain(|e| scope(e));

        let evaluator = Evaluator::new(&query.params, &self.tables);
        if let Some(template) = &query.template {
            rows.retain(|e| entity_matches(&evaluator, e, template));
        }

        sort_entities(&evaluator, &mut rows, &query);

        let total = rows.len();
        let page_size = self.config.effective_page_size(query.top);
        let skip = query.skip;
        let items: Vec<Entity> = rows.into_iter().skip(skip).take(page_size).collect();

        Ok(PagedResult {
            items,
            total_count: query.count.then_some(total),
            page_size,
            skip,
        })
    }

    fn collect_rows(
        &self,
        entity_type: EntityType,
        query: &StoreQuery,
        cancel: &CancelFlag,
    ) -> Result<Vec<Entity>> {
        Ok(match entity_type {
            EntityType::Thing => self
                .tables
                .things
                .read()
                .values()
                .cloned()
                .map(Entity::Thing)
                .collect(),
            EntityType::Location => self
                .tables
                .locations
                .read()
                .values()
                .cloned()
                .map(Entity::Location)
                .collect(),
            EntityType::HistoricalLocation => self
                .tables
                .historical_locations
                .read()
                .values()
                .cloned()
                .map(Entity::HistoricalLocation)
                .collect(),
            EntityType::Sensor => self
                .tables
                .sensors
                .read()
                .values()
                .cloned()
                .map(Entity::Sensor)
                .collect(),
            EntityType::ObservedProperty => self
                .tables
                .observed_properties
                .read()
                .values()
                .cloned()
                .map(Entity::ObservedProperty)
                .collect(),
            EntityType::Datastream => self
                .tables
                .datastreams
                .read()
                .values()
                .cloned()
                .map(Entity::Datastream)
                .collect(),
            EntityType::FeatureOfInterest => self
                .tables
                .features
                .read()
                .values()
                .cloned()
                .map(Entity::FeatureOfInterest)
                .collect(),
            EntityType::Observation => {
                // Observations go through the partitioned store so scans can
                // prune partitions and honor cancellation between chunks.
                let bounds = phenomenon_time_bounds(query);
                self.observations
                    .scan(Some(bounds), |_| true, cancel)?
                    .into_iter()
                    .map(Entity::Observation)
                    .collect()
            }
        })
    }
}

fn require_nonempty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(format!(
            "required field '{}' is missing or empty",
            field
        )));
    }
    Ok(())
}

fn entity_matches(evaluator: &Evaluator<'_>, entity: &Entity, template: &QueryTemplate) -> bool {
    match entity {
        Entity::Thing(e) => evaluator.matches(e, template),
        Entity::Location(e) => evaluator.matches(e, template),
        Entity::HistoricalLocation(e) => evaluator.matches(e, template),
        Entity::Sensor(e) => evaluator.matches(e, template),
        Entity::ObservedProperty(e) => evaluator.matches(e, template),
        Entity::Datastream(e) => evaluator.matches(e, template),
        Entity::Observation(e) => evaluator.matches(e, template),
        Entity::FeatureOfInterest(e) => evaluator.matches(e, template),
    }
}

fn sort_entities(evaluator: &Evaluator<'_>, rows: &mut [Entity], query: &StoreQuery) {
    if query.order.is_empty() {
        // Stable default ordering by id so paging is deterministic.
        rows.sort_by_key(|e| e.id());
        return;
    }
    // Sort the typed slices through the shared field machinery. Mixed
    // entity kinds never occur in one list, so sorting per kind is safe.
    macro_rules! sort_as {
        ($variant:path) => {{
            rows.sort_by(|a, b| {
                let (a, b) = match (a, b) {
                    ($variant(a), $variant(b)) => (a, b),
                    _ => return std::cmp::Ordering::Equal,
                };
                order_cmp(evaluator, a, b, query)
            });
        }};
    }
    match rows.first().map(|e| e.entity_type()) {
        Some(EntityType::Thing) => sort_as!(Entity::Thing),
        Some(EntityType::Location) => sort_as!(Entity::Location),
        Some(EntityType::HistoricalLocation) => sort_as!(Entity::HistoricalLocation),
        Some(EntityType::Sensor) => sort_as!(Entity::Sensor),
        Some(EntityType::ObservedProperty) => sort_as!(Entity::ObservedProperty),
        Some(EntityType::Datastream) => sort_as!(Entity::Datastream),
        Some(EntityType::Observation) => sort_as!(Entity::Observation),
        Some(EntityType::FeatureOfInterest) => sort_as!(Entity::FeatureOfInterest),
        None => {}
    }
}

fn order_cmp<R: EntityFields>(
    evaluator: &Evaluator<'_>,
    a: &R,
    b: &R,
    query: &StoreQuery,
) -> std::cmp::Ordering {
    for spec in &query.order {
        let va = evaluator.operand(a, &Operand::Field(spec.field.clone()));
        let vb = evaluator.operand(b, &Operand::Field(spec.field.clone()));
        let ord = crate::exec::cmp_for_sort(&va, &vb);
        let ord = if spec.descending { ord.reverse() } else { ord };
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

/// Extract phenomenon-time bounds from the conjunctive top of a template so
/// the observation scan can prune partitions. Only direct (non-navigated)
/// comparisons against a bound datetime participate.
fn phenomenon_time_bounds(query: &StoreQuery) -> (Option<Timestamp>, Option<Timestamp>) {
    let mut lo = None;
    let mut hi = None;
    if let Some(template) = &query.template {
        collect_bounds(template, &query.params, &mut lo, &mut hi);
    }
    (lo, hi)
}

fn collect_bounds(
    template: &QueryTemplate,
    params: &[ParamValue],
    lo: &mut Option<Timestamp>,
    hi: &mut Option<Timestamp>,
) {
    match template {
        QueryTemplate::And(a, b) => {
            collect_bounds(a, params, lo, hi);
            collect_bounds(b, params, lo, hi);
        }
        QueryTemplate::Compare { op, lhs, rhs } => {
            let (field, param, op) = match (lhs, rhs) {
                (Operand::Field(f), Operand::Param(p)) => (f, *p, *op),
                // `literal op field` flips the comparison direction.
                (Operand::Param(p), Operand::Field(f)) => {
                    let flipped = match op {
                        CompareOp::Gt => CompareOp::Lt,
                        CompareOp::Ge => CompareOp::Le,
                        CompareOp::Lt => CompareOp::Gt,
                        CompareOp::Le => CompareOp::Ge,
                        other => *other,
                    };
                    (f, *p, flipped)
                }
                _ => return,
            };
            if !field.hops.is_empty() || field.column != Column::PhenomenonTime {
                return;
            }
            let Some(ParamValue::DateTime(ts)) = params.get(param) else {
                return;
            };
            match op {
                CompareOp::Gt | CompareOp::Ge => {
                    if lo.as_ref().map_or(true, |cur| ts > cur) {
                        *lo = Some(ts.clone());
                    }
                }
                CompareOp::Lt | CompareOp::Le => {
                    if hi.as_ref().map_or(true, |cur| ts < cur) {
                        *hi = Some(ts.clone());
                    }
                }
                CompareOp::Eq => {
                    if lo.as_ref().map_or(true, |cur| ts > cur) {
                        *lo = Some(ts.clone());
                    }
                    if hi.as_ref().map_or(true, |cur| ts < cur) {
                        *hi = Some(ts.clone());
                    }
                }
                CompareOp::Ne => {}
            }
        }
        // Disjunctions and negations invalidate simple bounds; leave them
        // alone (the scan stays correct, just unpruned).
        _ => {}
    }
}
