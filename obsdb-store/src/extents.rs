//! Deferred refresh of datastream derived extents.
//!
//! Inserts mark their datastream dirty; this worker periodically drains the
//! dirty set and recomputes `phenomenon_time_start/end`,
//! `result_time_start/end`, and the observed-area bbox from the stored
//! rows. The refresh interval bounds the staleness window — the documented
//! trade-off for never serializing an insert behind an extent update.

use crate::observations::ObservationStore;
use crate::tables::EntityTables;
use obsdb_core::{BBox, EntityId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Stop handle for a running worker.
pub struct ExtentWorkerHandle {
    stop_tx: watch::Sender<bool>,
}

impl ExtentWorkerHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

pub struct ExtentRefreshWorker {
    tables: Arc<EntityTables>,
    observations: Arc<ObservationStore>,
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl ExtentRefreshWorker {
    pub fn new(
        tables: Arc<EntityTables>,
        observations: Arc<ObservationStore>,
        interval: Duration,
    ) -> (Self, ExtentWorkerHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                tables,
                observations,
                interval,
                stop_rx,
            },
            ExtentWorkerHandle { stop_tx },
        )
    }

    /// Run the refresh loop until stopped.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, "extent refresh worker started");
        loop {
            tokio::select! {
                _ = self.stop_rx.changed() => {
                    info!("extent refresh worker stopping");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    let refreshed = self.refresh_once();
                    if refreshed > 0 {
                        debug!(datastreams = refreshed, "refreshed derived extents");
                    }
                }
            }
        }
    }

    /// One sweep: recompute extents for every dirty datastream. Returns how
    /// many datastreams were refreshed.
    pub fn refresh_once(&self) -> usize {
        let dirty = self.observations.drain_dirty();
        let mut refreshed = 0;
        for datastream_id in dirty {
            if self.refresh_datastream(datastream_id) {
                refreshed += 1;
            }
        }
        refreshed
    }

    fn refresh_datastream(&self, datastream_id: EntityId) -> bool {
        // The datastream may have been deleted since it went dirty.
        if !self
            .tables
            .datastreams
            .read()
            .contains_key(&datastream_id)
        {
            return false;
        }

        let rows = self.observations.datastream_observations(datastream_id);

        let mut ph_start = None;
        let mut ph_end = None;
        let mut rt_start = None;
        let mut rt_end = None;
        let mut area: Option<BBox> = None;

        let features = self.tables.features.read();
        for obs in &rows {
            let t = &obs.phenomenon_time;
            if ph_start.as_ref().map_or(true, |cur| t < cur) {
                ph_start = Some(t.clone());
            }
            if ph_end.as_ref().map_or(true, |cur| t > cur) {
                ph_end = Some(t.clone());
            }
            if let Some(rt) = &obs.result_time {
                if rt_start.as_ref().map_or(true, |cur| rt < cur) {
                    rt_start = Some(rt.clone());
                }
                if rt_end.as_ref().map_or(true, |cur| rt > cur) {
                    rt_end = Some(rt.clone());
                }
            }
            if let Some(foi) = obs.feature_of_interest_id {
                if let Some(bbox) = features.get(&foi).and_then(|f| f.geometry.bbox()) {
                    area = Some(match area {
                        Some(cur) => cur.union(&bbox),
                        None => bbox,
                    });
                }
            }
        }
        drop(features);

        let mut datastreams = self.tables.datastreams.write();
        let Some(ds) = datastreams.get_mut(&datastream_id) else {
            return false;
        };
        ds.phenomenon_time_start = ph_start;
        ds.phenomenon_time_end = ph_end;
        ds.result_time_start = rt_start;
        ds.result_time_end = rt_end;
        ds.observed_area = area;
        true
    }
}
