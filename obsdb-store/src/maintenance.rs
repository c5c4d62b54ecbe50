//! Partition pre-creation maintenance.
//!
//! Keeps the "next N periods" invariant so that write latency never
//! includes partition creation on the hot path. If a write still targets a
//! missing partition (clock skew, backfill), creation is synchronous but
//! rare — see `ObservationStore::partition_for`.

use crate::observations::ObservationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

pub struct MaintenanceHandle {
    stop_tx: watch::Sender<bool>,
}

impl MaintenanceHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

pub struct PartitionMaintenanceWorker {
    observations: Arc<ObservationStore>,
    periods_ahead: usize,
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl PartitionMaintenanceWorker {
    pub fn new(
        observations: Arc<ObservationStore>,
        periods_ahead: usize,
        interval: Duration,
    ) -> (Self, MaintenanceHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                observations,
                periods_ahead,
                interval,
                stop_rx,
            },
            MaintenanceHandle { stop_tx },
        )
    }

    /// Run the maintenance loop until stopped. Pre-creates once at startup
    /// so the invariant holds before the first tick.
    pub async fn run(mut self) {
        info!(
            periods_ahead = self.periods_ahead,
            "partition maintenance worker started"
        );
        self.run_once();
        loop {
            tokio::select! {
                _ = self.stop_rx.changed() => {
                    info!("partition maintenance worker stopping");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.run_once();
                }
            }
        }
    }

    /// One maintenance pass. Returns partitions newly created.
    pub fn run_once(&self) -> usize {
        self.observations.precreate_ahead(self.periods_ahead)
    }
}
