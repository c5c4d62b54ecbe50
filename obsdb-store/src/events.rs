//! Store events and their handlers.
//!
//! The source system created HistoricalLocation rows from a database
//! trigger. Here the repository emits an explicit `LocationLinked` event
//! immediately after a Thing–Location link is written, and the recorder
//! consumes it synchronously. The invariant ("every link produces a
//! snapshot") lives in one visible place and is testable in isolation.

use crate::tables::EntityTables;
use obsdb_core::{EntityId, HistoricalLocation, Timestamp};
use std::sync::Arc;
use tracing::debug;

/// Events emitted by the entity repository after a write.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A Thing–Location link was established.
    LocationLinked {
        thing_id: EntityId,
        location_id: EntityId,
        time: Timestamp,
    },
}

/// Creates the append-only HistoricalLocation audit trail.
pub struct HistoricalLocationRecorder {
    tables: Arc<EntityTables>,
}

impl HistoricalLocationRecorder {
    pub fn new(tables: Arc<EntityTables>) -> Self {
        Self { tables }
    }

    /// Handle a store event. Only `LocationLinked` is of interest.
    pub fn handle(&self, event: &StoreEvent) -> Option<HistoricalLocation> {
        match event {
            StoreEvent::LocationLinked {
                thing_id,
                location_id,
                time,
            } => Some(self.record(*thing_id, *location_id, time.clone())),
        }
    }

    fn record(
        &self,
        thing_id: EntityId,
        location_id: EntityId,
        time: Timestamp,
    ) -> HistoricalLocation {
        let id = self.tables.allocate_id();
        let row = HistoricalLocation {
            id,
            thing_id,
            time,
            location_ids: vec![location_id],
        };
        self.tables
            .historical_locations
            .write()
            .insert(id, row.clone());
        debug!(thing = %thing_id, location = %location_id, "recorded historical location");
        row
    }
}
