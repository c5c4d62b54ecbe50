//! The partitioned observation store.
//!
//! Observations are range-partitioned by `phenomenon_time`. The partition
//! map is guarded by one `RwLock`; each partition by its own. Writers to
//! different partitions proceed in parallel; writers to the same partition
//! serialize at the partition level without blocking unrelated datastreams.
//!
//! Inserts record the affected datastream in a dirty set; the extent
//! refresh worker drains that set and recomputes derived extents out of
//! band, so the write path never pays for extent maintenance.

use crate::cancel::CancelFlag;
use crate::config::{PartitionGranularity, StoreConfig};
use crate::error::{Result, StoreError};
use crate::partition::{Partition, PeriodIndex};
use chrono::Utc;
use obsdb_core::{EntityId, Observation, ResultValue, Timestamp};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ObservationStore {
    granularity: PartitionGranularity,
    partitions: RwLock<BTreeMap<PeriodIndex, Arc<RwLock<Partition>>>>,
    /// Datastreams with writes since the last extent refresh.
    dirty: Mutex<FxHashSet<EntityId>>,
}

impl ObservationStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            granularity: config.granularity,
            partitions: RwLock::new(BTreeMap::new()),
            dirty: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn granularity(&self) -> PartitionGranularity {
        self.granularity
    }

    /// Partition containing `ts`, creating it synchronously if the
    /// maintenance worker has not pre-created it (rare path).
    fn partition_for(&self, ts: &Timestamp) -> Arc<RwLock<Partition>> {
        let period = PeriodIndex::of_timestamp(ts, self.granularity);
        if let Some(p) = self.partitions.read().get(&period) {
            return p.clone();
        }
        let mut map = self.partitions.write();
        map.entry(period)
            .or_insert_with(|| {
                debug!(
                    partition = %period.label(self.granularity),
                    "creating partition on the write path"
                );
                Arc::new(RwLock::new(Partition::new()))
            })
            .clone()
    }

    /// Pre-create partitions covering now through `periods_ahead` periods.
    /// Returns how many were newly created.
    pub fn precreate_ahead(&self, periods_ahead: usize) -> usize {
        let mut period = PeriodIndex::of(Utc::now(), self.granularity);
        let mut created = 0;
        let mut map = self.partitions.write();
        for _ in 0..=periods_ahead {
            if !map.contains_key(&period) {
                map.insert(period, Arc::new(RwLock::new(Partition::new())));
                created += 1;
            }
            period = period.next();
        }
        if created > 0 {
            info!(created, "pre-created observation partitions");
        }
        created
    }

    /// Append a single observation.
    pub fn insert(&self, obs: Observation) {
        let datastream_id = obs.datastream_id;
        let partition = self.partition_for(&obs.phenomenon_time);
        partition.write().append(obs);
        self.dirty.lock().insert(datastream_id);
    }

    /// Append a batch, grouped per partition so each partition lock is
    /// taken once. Appends cannot fail, so the batch is applied as a unit;
    /// callers must finish validation (and cancellation checks) before
    /// calling this.
    pub fn insert_bulk(&self, batch: Vec<Observation>) {
        let mut groups: BTreeMap<PeriodIndex, Vec<Observation>> = BTreeMap::new();
        let mut touched: FxHashSet<EntityId> = FxHashSet::default();
        for obs in batch {
            let period = PeriodIndex::of_timestamp(&obs.phenomenon_time, self.granularity);
            touched.insert(obs.datastream_id);
            groups.entry(period).or_default().push(obs);
        }

        for (period, rows) in groups {
            let partition = {
                // partition_for, but keyed by period directly
                if let Some(p) = self.partitions.read().get(&period) {
                    p.clone()
                } else {
                    let mut map = self.partitions.write();
                    map.entry(period)
                        .or_insert_with(|| Arc::new(RwLock::new(Partition::new())))
                        .clone()
                }
            };
            let mut guard = partition.write();
            for obs in rows {
                guard.append(obs);
            }
        }

        self.dirty.lock().extend(touched);
    }

    /// Probe for an existing `(datastream, phenomenon_time, result)` row.
    /// Only the partition containing the phenomenon time is consulted.
    pub fn find_duplicate(
        &self,
        datastream_id: EntityId,
        phenomenon_time: &Timestamp,
        result: &ResultValue,
    ) -> Option<EntityId> {
        let period = PeriodIndex::of_timestamp(phenomenon_time, self.granularity);
        let partition = self.partitions.read().get(&period)?.clone();
        let guard = partition.read();
        guard
            .find_duplicate(datastream_id, phenomenon_time, result)
            .map(|o| o.id)
    }

    /// Scan all rows matching `pred`, checking cancellation between
    /// partitions. Optional phenomenon-time bounds prune partitions before
    /// any row is touched.
    pub fn scan(
        &self,
        time_bounds: Option<(Option<Timestamp>, Option<Timestamp>)>,
        pred: impl Fn(&Observation) -> bool,
        cancel: &CancelFlag,
    ) -> Result<Vec<Observation>> {
        let (lo, hi) = match &time_bounds {
            Some((lo, hi)) => (
                lo.as_ref()
                    .map(|t| PeriodIndex::of_timestamp(t, self.granularity)),
                hi.as_ref()
                    .map(|t| PeriodIndex::of_timestamp(t, self.granularity)),
            ),
            None => (None, None),
        };

        let partitions: Vec<_> = self
            .partitions
            .read()
            .iter()
            .filter(|(period, _)| {
                lo.map_or(true, |lo| **period >= lo) && hi.map_or(true, |hi| **period <= hi)
            })
            .map(|(_, p)| p.clone())
            .collect();

        let mut out = Vec::new();
        for partition in partitions {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let guard = partition.read();
            out.extend(guard.rows().iter().filter(|o| pred(o)).cloned());
        }
        Ok(out)
    }

    /// All rows of one datastream, across partitions.
    pub fn datastream_observations(&self, datastream_id: EntityId) -> Vec<Observation> {
        let partitions: Vec<_> = self.partitions.read().values().cloned().collect();
        let mut out = Vec::new();
        for partition in partitions {
            let guard = partition.read();
            out.extend(guard.datastream_rows(datastream_id).cloned());
        }
        out
    }

    /// Drop every row of a datastream (delete cascade). Returns rows removed.
    pub fn remove_datastream(&self, datastream_id: EntityId) -> usize {
        let partitions: Vec<_> = self.partitions.read().values().cloned().collect();
        let mut removed = 0;
        for partition in partitions {
            removed += partition.write().remove_datastream(datastream_id);
        }
        self.dirty.lock().insert(datastream_id);
        removed
    }

    /// Remove a single observation by id. Returns the removed row's
    /// datastream id when found.
    pub fn remove_by_id(&self, id: EntityId) -> Option<EntityId> {
        let partitions: Vec<_> = self.partitions.read().values().cloned().collect();
        for partition in partitions {
            let mut guard = partition.write();
            if let Some(ds) = guard
                .rows()
                .iter()
                .find(|o| o.id == id)
                .map(|o| o.datastream_id)
            {
                guard.remove_row(id);
                self.dirty.lock().insert(ds);
                return Some(ds);
            }
        }
        None
    }

    /// Fetch a single observation by id.
    pub fn get(&self, id: EntityId) -> Option<Observation> {
        let partitions: Vec<_> = self.partitions.read().values().cloned().collect();
        for partition in partitions {
            let guard = partition.read();
            if let Some(obs) = guard.rows().iter().find(|o| o.id == id) {
                return Some(obs.clone());
            }
        }
        None
    }

    /// Drop whole partitions strictly older than `cutoff`'s period.
    /// Partition-at-a-time: rows inside the boundary partition are kept
    /// until the whole partition ages out.
    pub fn drop_partitions_before(&self, cutoff: &Timestamp) -> usize {
        let boundary = PeriodIndex::of_timestamp(cutoff, self.granularity);
        let mut map = self.partitions.write();
        let stale: Vec<PeriodIndex> = map.range(..boundary).map(|(k, _)| *k).collect();
        let mut rows_dropped = 0;
        for period in stale {
            if let Some(p) = map.remove(&period) {
                let n = p.read().len();
                rows_dropped += n;
                info!(
                    partition = %period.label(self.granularity),
                    rows = n,
                    "dropped partition past retention horizon"
                );
            }
        }
        rows_dropped
    }

    /// Datastreams written since the last drain.
    pub fn drain_dirty(&self) -> Vec<EntityId> {
        self.dirty.lock().drain().collect()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.read().len()
    }

    pub fn row_count(&self) -> usize {
        self.partitions
            .read()
            .values()
            .map(|p| p.read().len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ObservationStore {
        ObservationStore::new(&StoreConfig::default())
    }

    fn obs(ds: u64, time: &str, result: f64) -> Observation {
        Observation {
            id: EntityId(0),
            datastream_id: EntityId(ds),
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

    #[test]
    fn test_insert_routes_to_period_partition() {
        let s = store();
        s.insert(obs(1, "2024-01-15T00:00:00Z", 1.0));
        s.insert(obs(1, "2024-02-15T00:00:00Z", 2.0));
        assert_eq!(s.partition_count(), 2);
        assert_eq!(s.row_count(), 2);
    }

    #[test]
    fn test_bulk_insert_groups_by_partition() {
        let s = store();
        let batch = vec![
            obs(1, "2024-01-01T00:00:00Z", 1.0),
            obs(1, "2024-01-02T00:00:00Z", 2.0),
            obs(2, "2024-03-01T00:00:00Z", 3.0),
        ];
        s.insert_bulk(batch);
        assert_eq!(s.partition_count(), 2);
        assert_eq!(s.row_count(), 3);

        let dirty = s.drain_dirty();
        assert_eq!(dirty.len(), 2);
    }

    #[test]
    fn test_precreate_ahead_is_idempotent() {
        let s = store();
        let first = s.precreate_ahead(3);
        assert_eq!(first, 4); // current period + 3 ahead
        assert_eq!(s.precreate_ahead(3), 0);
    }

    #[test]
    fn test_scan_with_time_pruning() {
        let s = store();
        s.insert(obs(1, "2024-01-15T00:00:00Z", 1.0));
        s.insert(obs(1, "2024-02-15T00:00:00Z", 2.0));
        s.insert(obs(1, "2024-03-15T00:00:00Z", 3.0));

        let lo = Timestamp::parse("2024-02-01T00:00:00Z").unwrap();
        let rows = s
            .scan(Some((Some(lo), None)), |_| true, &CancelFlag::new())
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_scan_respects_cancellation() {
        let s = store();
        s.insert(obs(1, "2024-01-15T00:00:00Z", 1.0));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = s.scan(None, |_| true, &cancel).unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[test]
    fn test_find_duplicate_across_store() {
        let s = store();
        s.insert(obs(1, "2024-01-15T00:00:00Z", 21.5));
        let t = Timestamp::parse("2024-01-15T00:00:00Z").unwrap();
        assert!(s
            .find_duplicate(EntityId(1), &t, &ResultValue::Number(21.5))
            .is_some());
        assert!(s
            .find_duplicate(EntityId(1), &t, &ResultValue::Number(9.0))
            .is_none());
    }

    #[test]
    fn test_retention_drops_whole_partitions() {
        let s = store();
        s.insert(obs(1, "2023-01-15T00:00:00Z", 1.0));
        s.insert(obs(1, "2023-02-15T00:00:00Z", 2.0));
        s.insert(obs(1, "2024-06-15T00:00:00Z", 3.0));

        let cutoff = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
        let dropped = s.drop_partitions_before(&cutoff);
        assert_eq!(dropped, 2);
        assert_eq!(s.row_count(), 1);
    }
}
