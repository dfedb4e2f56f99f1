//! kvsync Server Binary

use anyhow::Result;
use kvsync_server::{Server, ServerConfig};
use tracing::info;

#[cfg(feature = "tracing")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    #[cfg(feature = "tracing")]
    {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
        let registry = tracing_subscriber::registry().with(filter);

        if config.logging.format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    info!(
        backend = ?config.fast_store.backend,
        "Starting kvsync server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
