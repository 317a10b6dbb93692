//! Axum server setup and router configuration.

use crate::api;
use crate::state::AppState;
use axum::Router;
use ballot_core::utils::retry::shutdown_requested;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .merge(api::live_router())
        .with_state(state)
}

/// Run the server until the shutdown flag is raised.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown_requested(&mut shutdown_rx).await })
        .await
}
