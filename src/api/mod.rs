//! Control API server module
//!
//! Lets the orchestrator stop a running pipeline and poll its progress.

use crate::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the control router
///
/// # Routes
///
/// - `POST /control` - `{"action": "stop"}` finishes the current iteration and stops
/// - `GET /status` - Current iteration and progress
/// - `GET /health` - Health check
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/control", post(routes::control))
        .route("/status", get(routes::status))
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `bind_address` and serve the control API until `shutdown` is cancelled
pub async fn start_control_server(
    state: AppState,
    bind_address: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!(address = %bind_address, "Starting control API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve_control(listener, state, shutdown).await
}

/// Serve the control API on an already bound listener until `shutdown` is cancelled
pub async fn serve_control(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(address) = listener.local_addr() {
        tracing::info!(address = %address, "Control API server listening");
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("Control API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
