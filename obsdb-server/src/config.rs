//! Server configuration: CLI flags merged with an optional TOML file.
//!
//! CLI/env values win; file values fill in what the CLI left unset; code
//! defaults cover the rest. The external base URL is configuration, not
//! data — links are derived from it per response.

use clap::Parser;
use obsdb_store::{PartitionGranularity, RetentionConfig, StoreConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "obsdb-server", version, about = "obsdb observation engine server")]
pub struct ServerArgs {
    /// Listen address
    #[arg(long, env = "OBSDB_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Externally visible base URL used for self-links,
    /// e.g. https://sensors.example/v1
    #[arg(long, env = "OBSDB_BASE_URL")]
    pub base_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, env = "OBSDB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Partition granularity: monthly or daily
    #[arg(long, value_enum)]
    pub granularity: Option<GranularityArg>,

    /// Partitions to pre-create ahead of now
    #[arg(long)]
    pub partitions_ahead: Option<usize>,

    /// Extent refresh interval in seconds
    #[arg(long)]
    pub extent_refresh_secs: Option<u64>,

    /// Observation retention horizon in days (absent = keep forever)
    #[arg(long)]
    pub observation_retention_days: Option<u64>,

    /// Historical-location retention horizon in days
    #[arg(long)]
    pub historical_location_retention_days: Option<u64>,

    /// Maximum rows per bulk batch
    #[arg(long)]
    pub max_batch_rows: Option<usize>,

    /// Hard cap on $top
    #[arg(long)]
    pub max_page_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum GranularityArg {
    Monthly,
    Daily,
}

/// TOML config file shape; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub listen: Option<SocketAddr>,
    pub base_url: Option<String>,
    pub granularity: Option<PartitionGranularity>,
    pub partitions_ahead: Option<usize>,
    pub extent_refresh_secs: Option<u64>,
    pub observation_retention_days: Option<u64>,
    pub historical_location_retention_days: Option<u64>,
    pub max_batch_rows: Option<usize>,
    pub max_page_size: Option<usize>,
}

impl ConfigFile {
    pub fn load(path: &std::path::Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config file {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("invalid config file: {}", e))
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub base_url: String,
    pub granularity: PartitionGranularity,
    pub partitions_ahead: usize,
    pub extent_refresh: Duration,
    pub observation_retention: Option<Duration>,
    pub historical_location_retention: Option<Duration>,
    pub max_batch_rows: usize,
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            listen_addr: "127.0.0.1:8090".parse().expect("valid default addr"),
            base_url: "http://127.0.0.1:8090/v1".to_string(),
            granularity: store.granularity,
            partitions_ahead: store.partitions_ahead,
            extent_refresh: store.extent_refresh_interval,
            observation_retention: None,
            historical_location_retention: None,
            max_batch_rows: store.max_batch_rows,
            max_page_size: store.max_page_size,
        }
    }
}

impl ServerConfig {
    /// Merge CLI args over file values over defaults.
    pub fn resolve(args: ServerArgs, file: ConfigFile) -> Self {
        let defaults = Self::default();
        let granularity = args
            .granularity
            .map(|g| match g {
                GranularityArg::Monthly => PartitionGranularity::Monthly,
                GranularityArg::Daily => PartitionGranularity::Daily,
            })
            .or(file.granularity)
            .unwrap_or(defaults.granularity);

        let days = |d: u64| Duration::from_secs(d * 24 * 3600);

        Self {
            listen_addr: args.listen.or(file.listen).unwrap_or(defaults.listen_addr),
            base_url: args
                .base_url
                .or(file.base_url)
                .unwrap_or(defaults.base_url),
            granularity,
            partitions_ahead: args
                .partitions_ahead
                .or(file.partitions_ahead)
                .unwrap_or(defaults.partitions_ahead),
            extent_refresh: args
                .extent_refresh_secs
                .or(file.extent_refresh_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.extent_refresh),
            observation_retention: args
                .observation_retention_days
                .or(file.observation_retention_days)
                .map(days),
            historical_location_retention: args
                .historical_location_retention_days
                .or(file.historical_location_retention_days)
                .map(days),
            max_batch_rows: args
                .max_batch_rows
                .or(file.max_batch_rows)
                .unwrap_or(defaults.max_batch_rows),
            max_page_size: args
                .max_page_size
                .or(file.max_page_size)
                .unwrap_or(defaults.max_page_size),
        }
    }

    /// Derive the engine tuning config.
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::default()
            .with_granularity(self.granularity)
            .with_partitions_ahead(self.partitions_ahead)
            .with_extent_refresh_interval(self.extent_refresh)
            .with_retention(RetentionConfig {
                observation_horizon: self.observation_retention,
                historical_location_horizon: self.historical_location_retention,
            })
            .with_max_batch_rows(self.max_batch_rows);
        config.max_page_size = self.max_page_size;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_wins_over_file() {
        let args = ServerArgs {
            listen: Some("0.0.0.0:9000".parse().unwrap()),
            base_url: None,
            config: None,
            granularity: None,
            partitions_ahead: Some(6),
            extent_refresh_secs: None,
            observation_retention_days: None,
            historical_location_retention_days: None,
            max_batch_rows: None,
            max_page_size: None,
        };
        let file = ConfigFile {
            listen: Some("127.0.0.1:1234".parse().unwrap()),
            base_url: Some("https://sensors.example/v1".into()),
            partitions_ahead: Some(2),
            ..ConfigFile::default()
        };
        let resolved = ServerConfig::resolve(args, file);
        assert_eq!(resolved.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(resolved.base_url, "https://sensors.example/v1");
        assert_eq!(resolved.partitions_ahead, 6);
    }

    #[test]
    fn test_retention_days_resolve_to_durations() {
        let args = ServerArgs {
            listen: None,
            base_url: None,
            config: None,
            granularity: None,
            partitions_ahead: None,
            extent_refresh_secs: None,
            observation_retention_days: Some(30),
            historical_location_retention_days: None,
            max_batch_rows: None,
            max_page_size: None,
        };
        let resolved = ServerConfig::resolve(args, ConfigFile::default());
        assert_eq!(
            resolved.observation_retention,
            Some(Duration::from_secs(30 * 24 * 3600))
        );
        assert!(resolved.historical_location_retention.is_none());
    }
}
