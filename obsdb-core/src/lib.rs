//! # obsdb Core
//!
//! Storage-agnostic core library for the obsdb observation engine.
//!
//! This crate provides:
//! - Entity records: `Thing`, `Location`, `Datastream`, `Observation`, ...
//! - Identifier types: `EntityId`, `EntityType`
//! - Temporal values with lexical-form preservation (`Timestamp`)
//! - Geometry values with exact-equality hashing (`GeometryValue`)
//! - Self-link construction from the currently configured base path
//!
//! ## Design Principles
//!
//! 1. **Storage-agnostic**: no store types, no async, no locks
//! 2. **Links are computed, never persisted**: every link derives from a
//!    `LinkContext` at serialization time
//! 3. **Polymorphic results are tagged at the boundary**: `ResultValue` is a
//!    sum type in memory and an opaque JSON value at rest

pub mod error;
pub mod geometry;
pub mod ids;
pub mod links;
pub mod model;
pub mod temporal;

pub use error::{Error, Result};
pub use geometry::{parse_wkt, BBox, GeometryValue};
pub use ids::{EntityId, EntityType};
pub use links::LinkContext;
pub use model::{
    Datastream, FeatureOfInterest, HistoricalLocation, Location, Observation, ObservedProperty,
    ResultValue, Sensor, Thing, UnitOfMeasurement,
};
pub use temporal::Timestamp;
