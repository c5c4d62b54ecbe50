//! Retention sweeps.
//!
//! Observations age out partition-at-a-time: whole partitions strictly
//! older than the horizon are dropped without scanning newer rows.
//! Historical locations are swept by timestamp (they are few).

use crate::config::RetentionConfig;
use crate::observations::ObservationStore;
use crate::tables::EntityTables;
use chrono::Utc;
use obsdb_core::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

pub struct RetentionHandle {
    stop_tx: watch::Sender<bool>,
}

impl RetentionHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

pub struct RetentionWorker {
    tables: Arc<EntityTables>,
    observations: Arc<ObservationStore>,
    retention: RetentionConfig,
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl RetentionWorker {
    pub fn new(
        tables: Arc<EntityTables>,
        observations: Arc<ObservationStore>,
        retention: RetentionConfig,
        interval: Duration,
    ) -> (Self, RetentionHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                tables,
                observations,
                retention,
                interval,
                stop_rx,
            },
            RetentionHandle { stop_tx },
        )
    }

    /// Whether any horizon is configured; callers skip spawning otherwise.
    pub fn is_active(&self) -> bool {
        self.retention.observation_horizon.is_some()
            || self.retention.historical_location_horizon.is_some()
    }

    pub async fn run(mut self) {
        info!("retention worker started");
        loop {
            tokio::select! {
                _ = self.stop_rx.changed() => {
                    info!("retention worker stopping");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_once(Timestamp::now());
                }
            }
        }
    }

    /// One sweep relative to `now`. Returns (observations dropped,
    /// historical locations dropped).
    pub fn sweep_once(&self, now: Timestamp) -> (usize, usize) {
        let mut obs_dropped = 0;
        let mut hl_dropped = 0;

        if let Some(horizon) = self.retention.observation_horizon {
            if let Some(cutoff) = cutoff(&now, horizon) {
                obs_dropped = self.observations.drop_partitions_before(&cutoff);
            }
        }

        if let Some(horizon) = self.retention.historical_location_horizon {
            if let Some(cutoff) = cutoff(&now, horizon) {
                let mut table = self.tables.historical_locations.write();
                let before = table.len();
                table.retain(|_, hl| hl.time >= cutoff);
                hl_dropped = before - table.len();
            }
        }

        if obs_dropped > 0 || hl_dropped > 0 {
            info!(
                observations = obs_dropped,
                historical_locations = hl_dropped,
                "retention sweep complete"
            );
        }
        (obs_dropped, hl_dropped)
    }
}

fn cutoff(now: &Timestamp, horizon: Duration) -> Option<Timestamp> {
    let horizon = chrono::Duration::from_std(horizon).ok()?;
    let instant = now.instant().checked_sub_signed(horizon)?;
    Some(Timestamp::from_instant(instant.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use obsdb_core::{EntityId, HistoricalLocation, Observation, ResultValue};

    fn obs(time: &str) -> Observation {
        Observation {
            id: EntityId(0),
            datastream_id: EntityId(1),
            feature_of_interest_id: None,
            phenomenon_time: Timestamp::parse(time).unwrap(),
            result_time: None,
            result: ResultValue::Number(0.0),
            result_quality: None,
            parameters: None,
            client_timestamp: None,
            server_timestamp: None,
            sync_batch_id: None,
        }
    }

    #[test]
    fn test_sweep_drops_old_partitions_and_snapshots() {
        let tables = Arc::new(EntityTables::new());
        let observations = Arc::new(ObservationStore::new(&StoreConfig::default()));

        observations.insert(obs("2022-01-15T00:00:00Z"));
        observations.insert(obs("2024-05-15T00:00:00Z"));
        tables.historical_locations.write().insert(
            EntityId(9),
            HistoricalLocation {
                id: EntityId(9),
                thing_id: EntityId(1),
                time: Timestamp::parse("2022-01-15T00:00:00Z").unwrap(),
                location_ids: vec![EntityId(2)],
            },
        );

        let retention = RetentionConfig {
            // ~1 year horizon.
            observation_horizon: Some(Duration::from_secs(365 * 24 * 3600)),
            historical_location_horizon: Some(Duration::from_secs(365 * 24 * 3600)),
        };
        let (worker, _handle) = RetentionWorker::new(
            tables.clone(),
            observations.clone(),
            retention,
            Duration::from_secs(3600),
        );

        let now = Timestamp::parse("2024-06-01T00:00:00Z").unwrap();
        let (obs_dropped, hl_dropped) = worker.sweep_once(now);

        assert_eq!(obs_dropped, 1);
        assert_eq!(hl_dropped, 1);
        assert_eq!(observations.row_count(), 1);
    }

    #[test]
    fn test_no_horizon_means_keep_forever() {
        let tables = Arc::new(EntityTables::new());
        let observations = Arc::new(ObservationStore::new(&StoreConfig::default()));
        observations.insert(obs("2000-01-01T00:00:00Z"));

        let (worker, _handle) = RetentionWorker::new(
            tables,
            observations.clone(),
            RetentionConfig::default(),
            Duration::from_secs(3600),
        );
        assert!(!worker.is_active());
        worker.sweep_once(Timestamp::now());
        assert_eq!(observations.row_count(), 1);
    }
}
