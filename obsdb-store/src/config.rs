//! Store configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Granularity of observation time-range partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartitionGranularity {
    /// One partition per calendar day.
    Daily,
    /// One partition per calendar month (default).
    #[default]
    Monthly,
}

/// Retention horizons. `None` means keep forever.
#[derive(Debug, Clone, Default)]
pub struct RetentionConfig {
    /// Observations older than this are eligible for deletion.
    pub observation_horizon: Option<Duration>,
    /// Historical locations older than this are eligible for deletion.
    pub historical_location_horizon: Option<Duration>,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Partition granularity for the observation store.
    pub granularity: PartitionGranularity,

    /// How many future periods the maintenance worker keeps pre-created,
    /// so the write path rarely pays partition-creation cost.
    pub partitions_ahead: usize,

    /// Interval between partition maintenance runs.
    pub maintenance_interval: Duration,

    /// Interval between extent refresh sweeps. This bounds the staleness
    /// window of datastream derived extents.
    pub extent_refresh_interval: Duration,

    /// Interval between retention sweeps.
    pub retention_sweep_interval: Duration,

    /// Retention horizons.
    pub retention: RetentionConfig,

    /// Page size applied when a request names none.
    pub default_page_size: usize,

    /// Hard cap on `$top`.
    pub max_page_size: usize,

    /// Hard cap on rows per bulk-ingestion batch.
    pub max_batch_rows: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            granularity: PartitionGranularity::Monthly,
            partitions_ahead: 3,
            maintenance_interval: Duration::from_secs(60),
            extent_refresh_interval: Duration::from_secs(30),
            retention_sweep_interval: Duration::from_secs(3600),
            retention: RetentionConfig::default(),
            default_page_size: 100,
            max_page_size: 1000,
            max_batch_rows: 10_000,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_granularity(mut self, granularity: PartitionGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_partitions_ahead(mut self, n: usize) -> Self {
        self.partitions_ahead = n;
        self
    }

    pub fn with_extent_refresh_interval(mut self, interval: Duration) -> Self {
        self.extent_refresh_interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_max_batch_rows(mut self, n: usize) -> Self {
        self.max_batch_rows = n;
        self
    }

    /// Clamp a requested `$top` to the configured bounds.
    pub fn effective_page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}
