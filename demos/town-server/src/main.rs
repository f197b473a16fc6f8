//! Standalone Townsquare server backed by the in-memory channel provider.
//!
//! ```text
//! TOWNSQUARE_BIND=0.0.0.0:8081 RUST_LOG=townsquare=debug cargo run -p town-server
//! ```

use townsquare::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(bind) = std::env::var("TOWNSQUARE_BIND") {
        config.bind_addr = bind;
    }

    let server = TownsquareServerBuilder::new()
        .config(config)
        .build(InMemoryProvider::new())
        .await?;

    info!(addr = %server.local_addr()?, "town server listening");
    server.run().await?;

    Ok(())
}
