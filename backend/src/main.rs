use anyhow::Result;
use guardian_backend::{config::EngineConfig, create_router, initialize_backend};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::load()?;
    info!("Using data directory {}", config.data_dir.display());

    let app_state = initialize_backend(&config).await?;
    let app = create_router(app_state, &config)?;

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
