use crate::config::Config;
use crate::sse::Broadcaster;
use crate::startup::AppState;
use std::net::SocketAddr;
use tokio::signal::{self, ctrl_c};
use tracing_subscriber::{EnvFilter, fmt};

#[macro_use]
extern crate tracing;

mod aggregator;
mod config;
mod db;
mod error;
mod identity;
mod question_board;
mod questions;
mod render;
mod routes;
mod sse;
mod startup;
mod votes;

#[tokio::main]
async fn main() {
    // initialize tracing, RUST_LOG overrides the default level
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let port = config.port;

    let app_state = match AppState::new(config).await {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to initialize state: {}", e);
            std::process::exit(1);
        }
    };
    let broadcaster = app_state.broadcaster.clone();

    let app = routes::router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    // Peer addresses stand in for voter identity.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(broadcaster))
    .await
    .expect("Server error");

    info!("Server shut down");
}

/// Resolves on Ctrl+C or SIGTERM, and closes every live stream so that
/// graceful shutdown is not held open by viewers.
async fn shutdown_signal(broadcaster: Broadcaster) {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    broadcaster.shutdown();
}
