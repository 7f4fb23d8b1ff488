//! Block Party Server
//!
//! Runs the game coordinator until Ctrl-C.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use block_party::{
    network::{GameServer, ServerConfig},
    VERSION,
};

/// Log level used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("Block Party Server v{}", VERSION);
    info!("Tick interval: {:?}", config.tick_interval);
    info!("Intermission: {} ms", config.tick.intermission_ms);

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_server.shutdown(),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
