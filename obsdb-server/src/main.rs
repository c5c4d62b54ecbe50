//! obsdb server CLI
//!
//! Run with: `cargo run -p obsdb-server -- --help`

use clap::Parser;
use mimalloc::MiMalloc;
use obsdb_server::config::{ConfigFile, ServerArgs};
use obsdb_server::{telemetry, ObsServer, ServerConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();

    let file = match &args.config {
        Some(path) => match ConfigFile::load(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Warning: {e}");
                ConfigFile::default()
            }
        },
        None => ConfigFile::default(),
    };
    let config = ServerConfig::resolve(args, file);

    telemetry::init_logging();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.listen_addr,
        base_url = %config.base_url,
        granularity = ?config.granularity,
        partitions_ahead = config.partitions_ahead,
        extent_refresh = ?config.extent_refresh,
        "starting obsdb server"
    );

    ObsServer::new(config).run().await.map_err(Into::into)
}
