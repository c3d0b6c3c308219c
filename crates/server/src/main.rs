//! Fathom game room server.

use std::sync::Arc;

use server::catalog::FishCatalog;
use server::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Fathom Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration");
    info!("  Name: {}", config.server.name);
    info!("  Port: {}", config.server.port);
    info!("  Tick interval: {}ms", config.server.tick_interval_ms);
    info!("  Catalog: {}", config.catalog.path);

    // Load the fish catalog; the room refuses to start without it
    let catalog = Arc::new(FishCatalog::load(&config.catalog.path)?);

    // Start the room server
    server::server::run(config, catalog).await?;

    Ok(())
}
