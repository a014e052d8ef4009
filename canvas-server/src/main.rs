use std::net::SocketAddr;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use canvas_core::CanvasConfig;
use canvas_server::http::create_router;
use canvas_server::metrics::Metrics;
use canvas_server::{reaper, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = CanvasConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    let metrics = Metrics::install();
    let state = AppState::new(config, metrics);
    let port = state.config.port;

    reaper::spawn(state.clone());

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "canvas-server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
