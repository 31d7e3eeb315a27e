//! Bookshelf Server - offline caching front for the bookshelf app

use anyhow::Result;
use bookshelf_server::{routes, state};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookshelf_server=debug,bookshelf_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = state::ServerConfig::from_env()?;
    let state = state::AppState::new(&config).await?;

    // Install in the background; requests pass through until activation
    let cache = state.cache.clone();
    tokio::spawn(async move {
        match cache.resume().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not reuse stored cache: {}", e),
        }
        if let Err(e) = cache.install().await {
            tracing::error!("Serving without offline cache: {}", e);
        }
    });

    let app = routes::create_router(state);

    tracing::info!("Starting server on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
