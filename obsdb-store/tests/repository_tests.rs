//! End-to-end repository tests: CRUD, navigation, filters, cascades, and
//! the get-or-create feature-of-interest contract.

use obsdb_core::{
    Datastream, EntityId, EntityType, FeatureOfInterest, GeometryValue, LinkContext, Location,
    Observation, ObservedProperty, ResultValue, Sensor, Thing, Timestamp, UnitOfMeasurement,
};
use obsdb_query::QueryOptions;
use obsdb_store::{CancelFlag, Entity, EntityRepository, EntityTables, ObservationStore, StoreConfig};
use std::sync::Arc;

fn repository() -> EntityRepository {
    let config = StoreConfig::default();
    let tables = Arc::new(EntityTables::new());
    let observations = Arc::new(ObservationStore::new(&config));
    EntityRepository::new(config, tables, observations)
}

fn thing(name: &str) -> Thing {
    Thing {
        id: EntityId(0),
        name: name.into(),
        description: "test thing".into(),
        properties: None,
        sync_key: None,
    }
}

fn sensor() -> Sensor {
    Sensor {
        id: EntityId(0),
        name: "dht22".into(),
        description: "temp/humidity sensor".into(),
        encoding_type: "application/pdf".into(),
        metadata: "datasheet".into(),
    }
}

fn observed_property() -> ObservedProperty {
    ObservedProperty {
        id: EntityId(0),
        name: "air temperature".into(),
        definition: "http://vocab.example/AirTemperature".into(),
        description: String::new(),
    }
}

fn datastream(name: &str, thing: EntityId, sensor: EntityId, op: EntityId) -> Datastream {
    Datastream {
        id: EntityId(0),
        name: name.into(),
        description: String::new(),
        thing_id: thing,
        sensor_id: sensor,
        observed_property_id: op,
        unit_of_measurement: UnitOfMeasurement {
            name: "degree Celsius".into(),
            symbol: "°C".into(),
            definition: "ucum:Cel".into(),
        },
        observation_type: None,
        phenomenon_time_start: None,
        phenomenon_time_end: None,
        result_time_start: None,
        result_time_end: None,
        observed_area: None,
    }
}

fn observation(ds: EntityId, time: &str, result: f64) -> Observation {
    Observation {
        id: EntityId(0),
        datastream_id: ds,
        feature_of_interest_id: None,
        phenomenon_time: Timestamp::parse(time).unwrap(),
        result_time: None,
        result: ResultValue::Number(result),
        result_quality: None,
        parameters: None,
        client_timestamp: None,
        server_timestamp: None,
        sync_batch_id: None,
    }
}

/// Create the standard thing/sensor/property/datastream graph.
fn seed(repo: &EntityRepository) -> (EntityId, EntityId) {
    let t = repo.create_thing(thing("Weather Station 12")).unwrap();
    let s = repo.create_sensor(sensor()).unwrap();
    let op = repo.create_observed_property(observed_property()).unwrap();
    let ds = repo
        .create_datastream(datastream("air temp", t.id, s.id, op.id))
        .unwrap();
    (t.id, ds.id)
}

#[test]
fn test_create_assigns_identity_and_validates() {
    let repo = repository();
    let created = repo.create_thing(thing("station")).unwrap();
    assert_ne!(created.id, EntityId(0));

    let err = repo.create_thing(thing("")).unwrap_err();
    assert!(err.to_string().contains("name"));
}

#[test]
fn test_self_link_tracks_current_base_path() {
    let repo = repository();
    let created = repo.create_thing(thing("station")).unwrap();
    let entity = repo.get(EntityType::Thing, created.id).unwrap();

    let old = LinkContext::new("https://old.example/v1");
    let new = LinkContext::new("https://new.example/api");
    let a = entity.to_json(&old);
    let b = entity.to_json(&new);
    assert_eq!(
        a["selfLink"],
        format!("https://old.example/v1/Things({})", created.id)
    );
    assert_eq!(
        b["selfLink"],
        format!("https://new.example/api/Things({})", created.id)
    );
}

#[test]
fn test_datastream_requires_existing_references() {
    let repo = repository();
    let err = repo
        .create_datastream(datastream("ds", EntityId(99), EntityId(98), EntityId(97)))
        .unwrap_err();
    assert!(err.to_string().contains("unknown Thing"));
}

#[test]
fn test_update_patch_merges_and_keeps_id() {
    let repo = repository();
    let created = repo.create_thing(thing("station")).unwrap();

    let updated = repo
        .update(
            EntityType::Thing,
            created.id,
            serde_json::json!({"description": "relocated", "id": 12345}),
        )
        .unwrap();
    match updated {
        Entity::Thing(t) => {
            assert_eq!(t.id, created.id);
            assert_eq!(t.description, "relocated");
            assert_eq!(t.name, "station");
        }
        other => panic!("unexpected entity: {:?}", other),
    }
}

#[test]
fn test_observations_are_immutable() {
    let repo = repository();
    let (_, ds) = seed(&repo);
    let created = repo
        .create_observation(observation(ds, "2024-01-01T00:00:00Z", 1.0))
        .unwrap();
    let err = repo
        .update(
            EntityType::Observation,
            created.id,
            serde_json::json!({"result": 2.0}),
        )
        .unwrap_err();
    assert!(err.to_string().contains("immutable"));
}

#[test]
fn test_get_unknown_is_not_found() {
    let repo = repository();
    let err = repo.get(EntityType::Thing, EntityId(404)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_list_with_filter_and_paging() {
    let repo = repository();
    let (_, ds) = seed(&repo);
    for i in 0..10 {
        repo.create_observation(observation(
            ds,
            &format!("2024-01-01T00:{:02}:00Z", i),
            i as f64,
        ))
        .unwrap();
    }

    let opts = QueryOptions::new()
        .with_filter("result ge 5")
        .with_top(3)
        .with_count();
    let page = repo
        .list(EntityType::Observation, &opts, &CancelFlag::new())
        .unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_count, Some(5));
}

#[test]
fn test_malformed_filter_fails_the_request() {
    let repo = repository();
    seed(&repo);
    let opts = QueryOptions::new().with_filter("name eq");
    let err = repo
        .list(EntityType::Thing, &opts, &CancelFlag::new())
        .unwrap_err();
    // Never an unfiltered fallback.
    assert!(err.to_string().contains("syntax"));
}

#[test]
fn test_unsupported_function_is_reported() {
    let repo = repository();
    seed(&repo);
    let opts = QueryOptions::new().with_filter("now() eq 2024-01-01T00:00:00Z");
    let err = repo
        .list(EntityType::Thing, &opts, &CancelFlag::new())
        .unwrap_err();
    match err {
        obsdb_store::StoreError::Filter(f) => assert!(f.is_unsupported_function()),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_navigation_scoped_list() {
    let repo = repository();
    let (thing_id, ds) = seed(&repo);

    // A second datastream on a second thing, to prove scoping.
    let t2 = repo.create_thing(thing("Buoy 3")).unwrap();
    let s2 = repo.create_sensor(sensor()).unwrap();
    let op2 = repo.create_observed_property(observed_property()).unwrap();
    repo.create_datastream(datastream("water temp", t2.id, s2.id, op2.id))
        .unwrap();

    let page = repo
        .list_related(
            EntityType::Thing,
            thing_id,
            EntityType::Datastream,
            &QueryOptions::default(),
            &CancelFlag::new(),
        )
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id(), ds);

    // Unknown parent id → NotFound, not an empty page.
    let err = repo
        .list_related(
            EntityType::Thing,
            EntityId(404),
            EntityType::Datastream,
            &QueryOptions::default(),
            &CancelFlag::new(),
        )
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_single_valued_navigation() {
    let repo = repository();
    let (thing_id, ds) = seed(&repo);
    let entity = repo
        .get_related(EntityType::Datastream, ds, EntityType::Thing)
        .unwrap();
    assert_eq!(entity.id(), thing_id);
}

#[test]
fn test_thing_delete_cascades_to_datastreams_and_observations() {
    let repo = repository();
    let (thing_id, ds) = seed(&repo);
    repo.create_observation(observation(ds, "2024-01-01T00:00:00Z", 1.0))
        .unwrap();

    repo.delete(EntityType::Thing, thing_id).unwrap();

    assert!(repo.get(EntityType::Datastream, ds).is_err());
    assert_eq!(repo.observations().row_count(), 0);
}

#[test]
fn test_reference_data_in_use_cannot_be_deleted() {
    let repo = repository();
    seed(&repo);
    let sensor_id = repo
        .list(EntityType::Sensor, &QueryOptions::default(), &CancelFlag::new())
        .unwrap()
        .items[0]
        .id();
    let err = repo.delete(EntityType::Sensor, sensor_id).unwrap_err();
    assert!(err.to_string().contains("referenced"));
}

#[test]
fn test_link_thing_location_records_history() {
    let repo = repository();
    let (thing_id, _) = seed(&repo);
    let location = repo
        .create_location(Location {
            id: EntityId(0),
            name: "site A".into(),
            description: String::new(),
            encoding_type: "application/wkt".into(),
            geometry: GeometryValue::parse("POINT(8.0 51.9)").unwrap(),
        })
        .unwrap();

    let hl = repo.link_thing_location(thing_id, location.id).unwrap();
    assert_eq!(hl.thing_id, thing_id);
    assert_eq!(hl.location_ids, vec![location.id]);

    let page = repo
        .list_related(
            EntityType::Thing,
            thing_id,
            EntityType::HistoricalLocation,
            &QueryOptions::default(),
            &CancelFlag::new(),
        )
        .unwrap();
    assert_eq!(page.items.len(), 1);
}

#[test]
fn test_observation_derives_feature_from_thing_location() {
    let repo = repository();
    let (thing_id, ds) = seed(&repo);
    let location = repo
        .create_location(Location {
            id: EntityId(0),
            name: "site A".into(),
            description: String::new(),
            encoding_type: "application/wkt".into(),
            geometry: GeometryValue::parse("POINT(8.0 51.9)").unwrap(),
        })
        .unwrap();
    repo.link_thing_location(thing_id, location.id).unwrap();

    let o1 = repo
        .create_observation(observation(ds, "2024-01-01T00:00:00Z", 1.0))
        .unwrap();
    let o2 = repo
        .create_observation(observation(ds, "2024-01-01T00:01:00Z", 2.0))
        .unwrap();

    // Both observations share one derived feature (get-or-create).
    assert!(o1.feature_of_interest_id.is_some());
    assert_eq!(o1.feature_of_interest_id, o2.feature_of_interest_id);
    assert_eq!(repo.tables().features.read().len(), 1);
}

#[test]
fn test_get_or_create_feature_concurrent_convergence() {
    let repo = Arc::new(repository());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        handles.push(std::thread::spawn(move || {
            let g = GeometryValue::parse("POINT(8.0 51.9)").unwrap();
            repo.get_or_create_feature("site", "", "application/wkt", g)
                .unwrap()
                .0
                .id
        }));
    }
    let ids: Vec<EntityId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(repo.tables().features.read().len(), 1);
}

#[test]
fn test_create_feature_reuses_equal_geometry() {
    let repo = repository();
    let make = || FeatureOfInterest {
        id: EntityId(0),
        name: "site".into(),
        description: String::new(),
        encoding_type: "application/wkt".into(),
        geometry: GeometryValue::parse("POINT(1 2)").unwrap(),
    };
    let a = repo.create_feature(make()).unwrap();
    let b = repo.create_feature(make()).unwrap();
    assert_eq!(a.id, b.id);
}

#[test]
fn test_orderby_and_default_ordering() {
    let repo = repository();
    let (_, ds) = seed(&repo);
    repo.create_observation(observation(ds, "2024-01-03T00:00:00Z", 3.0))
        .unwrap();
    repo.create_observation(observation(ds, "2024-01-01T00:00:00Z", 1.0))
        .unwrap();
    repo.create_observation(observation(ds, "2024-01-02T00:00:00Z", 2.0))
        .unwrap();

    let opts = QueryOptions::new()
        .with_order_by(QueryOptions::parse_order_by("phenomenonTime desc").unwrap());
    let page = repo
        .list(EntityType::Observation, &opts, &CancelFlag::new())
        .unwrap();
    let results: Vec<f64> = page
        .items
        .iter()
        .filter_map(|e| match e {
            Entity::Observation(o) => o.result.as_number(),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec![3.0, 2.0, 1.0]);
}

#[test]
fn test_cancelled_list_stops() {
    let repo = repository();
    let (_, ds) = seed(&repo);
    repo.create_observation(observation(ds, "2024-01-01T00:00:00Z", 1.0))
        .unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = repo
        .list(EntityType::Observation, &QueryOptions::default(), &cancel)
        .unwrap_err();
    assert!(matches!(err, obsdb_store::StoreError::Cancelled));
}
