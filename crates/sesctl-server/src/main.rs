//! sesctl-server - session control backend
//!
//! REST API for session lifecycle management with a periodic inactivity
//! sweep.

use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sesctl_server::{config, routes, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sesctl_server=info".parse()?))
        .init();

    info!("sesctl-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!(
        backend = ?config.backend,
        timeout_secs = config.session_timeout.as_secs(),
        "Config loaded"
    );

    let listen_addr = config.listen_addr;
    let sweep_interval = config.sweep_interval;

    let state = state::AppState::new(config)?;
    state.sweeper.start(sweep_interval).await;

    let router = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("Listening on http://{listen_addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.sweeper.stop().await;
    info!("Shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    // Shutdown on ctrl_c; failure to register the handler would leave no way
    // to stop gracefully, so surface it loudly.
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
    }
}
