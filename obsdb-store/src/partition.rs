//! Time-range partitions for the observation store.
//!
//! Partitions are arena-like pre-allocated ranges indexed by a period
//! number derived from `phenomenon_time`. A background task maintains the
//! "next N periods" invariant; creation on the write path is the rare
//! fallback, not the norm.
//!
//! Rows inside a partition are append-mostly. Each partition keeps a
//! per-datastream row index so datastream-scoped scans and the sync-path
//! duplicate probe avoid walking unrelated rows.

use crate::config::PartitionGranularity;
use chrono::{DateTime, Datelike, Utc};
use obsdb_core::{EntityId, Observation, ResultValue, Timestamp};
use rustc_hash::FxHashMap;
use std::fmt;

/// Partition key: period number since epoch at the configured granularity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(transparent)]
pub struct PeriodIndex(pub i32);

impl PeriodIndex {
    /// Compute the period containing an instant.
    pub fn of(instant: DateTime<Utc>, granularity: PartitionGranularity) -> Self {
        match granularity {
            PartitionGranularity::Monthly => {
                PeriodIndex(instant.year() * 12 + instant.month0() as i32)
            }
            PartitionGranularity::Daily => {
                // Days since the Unix epoch.
                PeriodIndex((instant.timestamp().div_euclid(86_400)) as i32)
            }
        }
    }

    /// Compute the period containing a timestamp.
    pub fn of_timestamp(ts: &Timestamp, granularity: PartitionGranularity) -> Self {
        Self::of(ts.instant(), granularity)
    }

    pub fn next(self) -> Self {
        PeriodIndex(self.0 + 1)
    }

    /// Human-readable label for logs (`2024-03` or `day-19876`).
    pub fn label(self, granularity: PartitionGranularity) -> String {
        match granularity {
            PartitionGranularity::Monthly => {
                format!("{:04}-{:02}", self.0.div_euclid(12), self.0.rem_euclid(12) + 1)
            }
            PartitionGranularity::Daily => format!("day-{}", self.0),
        }
    }
}

impl fmt::Display for PeriodIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One time-range partition of observation rows.
#[derive(Debug, Default)]
pub struct Partition {
    rows: Vec<Observation>,
    /// datastream id → indices into `rows`.
    by_datastream: FxHashMap<EntityId, Vec<u32>>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row, maintaining the datastream index.
    pub fn append(&mut self, obs: Observation) {
        let idx = self.rows.len() as u32;
        self.by_datastream
            .entry(obs.datastream_id)
            .or_default()
            .push(idx);
        self.rows.push(obs);
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows of a single datastream via the index.
    pub fn datastream_rows(&self, datastream_id: EntityId) -> impl Iterator<Item = &Observation> {
        self.by_datastream
            .get(&datastream_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.rows[i as usize])
    }

    /// Find an existing row with the same identity triple
    /// `(datastream, phenomenon_time, result)`, if any.
    pub fn find_duplicate(
        &self,
        datastream_id: EntityId,
        phenomenon_time: &Timestamp,
        result: &ResultValue,
    ) -> Option<&Observation> {
        self.datastream_rows(datastream_id)
            .find(|o| &o.phenomenon_time == phenomenon_time && &o.result == result)
    }

    /// Remove a single row by id. Rebuilds the index when a row is removed.
    pub fn remove_row(&mut self, id: EntityId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|o| o.id != id);
        let removed = before != self.rows.len();
        if removed {
            self.rebuild_index();
        }
        removed
    }

    /// Drop every row of a datastream (delete cascade). Rebuilds the index.
    pub fn remove_datastream(&mut self, datastream_id: EntityId) -> usize {
        let before = self.rows.len();
        self.rows.retain(|o| o.datastream_id != datastream_id);
        let removed = before - self.rows.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    fn rebuild_index(&mut self) {
        self.by_datastream.clear();
        for (i, obs) in self.rows.iter().enumerate() {
            self.by_datastream
                .entry(obs.datastream_id)
                .or_default()
                .push(i as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdb_core::ResultValue;

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
    fn test_monthly_period_of() {
        let granularity = PartitionGranularity::Monthly;
        let jan = Timestamp::parse("2024-01-15T00:00:00Z").unwrap();
        let feb = Timestamp::parse("2024-02-01T00:00:00Z").unwrap();
        let p_jan = PeriodIndex::of_timestamp(&jan, granularity);
        let p_feb = PeriodIndex::of_timestamp(&feb, granularity);
        assert_eq!(p_jan.next(), p_feb);
        assert_eq!(p_jan.label(granularity), "2024-01");
    }

    #[test]
    fn test_daily_period_of() {
        let granularity = PartitionGranularity::Daily;
        let a = Timestamp::parse("2024-01-15T23:59:59Z").unwrap();
        let b = Timestamp::parse("2024-01-16T00:00:01Z").unwrap();
        let pa = PeriodIndex::of_timestamp(&a, granularity);
        let pb = PeriodIndex::of_timestamp(&b, granularity);
        assert_eq!(pa.next(), pb);
    }

    #[test]
    fn test_datastream_index() {
        let mut p = Partition::new();
        p.append(obs(1, "2024-01-01T00:00:00Z", 1.0));
        p.append(obs(2, "2024-01-01T00:01:00Z", 2.0));
        p.append(obs(1, "2024-01-01T00:02:00Z", 3.0));

        let ds1: Vec<_> = p.datastream_rows(EntityId(1)).collect();
        assert_eq!(ds1.len(), 2);
        assert_eq!(p.datastream_rows(EntityId(3)).count(), 0);
    }

    #[test]
    fn test_find_duplicate() {
        let mut p = Partition::new();
        p.append(obs(1, "2024-01-01T00:00:00Z", 21.5));

        let t = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
        assert!(p
            .find_duplicate(EntityId(1), &t, &ResultValue::Number(21.5))
            .is_some());
        assert!(p
            .find_duplicate(EntityId(1), &t, &ResultValue::Number(22.0))
            .is_none());
        assert!(p
            .find_duplicate(EntityId(2), &t, &ResultValue::Number(21.5))
            .is_none());
    }

    #[test]
    fn test_remove_datastream_rebuilds_index() {
        let mut p = Partition::new();
        p.append(obs(1, "2024-01-01T00:00:00Z", 1.0));
        p.append(obs(2, "2024-01-01T00:01:00Z", 2.0));
        p.append(obs(1, "2024-01-01T00:02:00Z", 3.0));

        assert_eq!(p.remove_datastream(EntityId(1)), 2);
        assert_eq!(p.len(), 1);
        assert_eq!(p.datastream_rows(EntityId(2)).count(), 1);
    }
}
