//! Gateway server setup
//!
//! Router, state construction and the serve loop.

mod handler;
mod state;

pub use handler::{node_socket_handler, HandshakeParams};
pub use state::GatewayState;

use crate::NodeGateway;
use axum::{routing::get, Router};
use nova_common::{AppConfig, AppError, AppResult};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws", get(node_socket_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the node gateway, start its heartbeat and wrap it in `GatewayState`
///
/// Must be called from within a Tokio runtime.
pub fn create_gateway_state(config: AppConfig) -> AppResult<GatewayState> {
    let gateway = Arc::new(NodeGateway::new(config.heartbeat.clone())?);
    gateway.start();
    Ok(GatewayState::new(gateway))
}

/// Serve the application on an already bound listener until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> AppResult<()> {
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(AppError::Server)
}

/// Bind `addr` and serve the application until `shutdown` resolves
pub async fn run_server(
    app: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> AppResult<()> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;

    tracing::info!("Gateway listening on ws://{}/ws", addr);

    serve(listener, app, shutdown).await
}

/// Run the complete gateway server with configuration
///
/// Returns after Ctrl-C, once every node connection has been closed.
pub async fn run(config: AppConfig) -> AppResult<()> {
    let address = config.gateway.address();
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| AppError::InvalidAddress(address.clone()))?;

    let state = create_gateway_state(config)?;
    let gateway = state.gateway_handle();
    let app = create_app(state);

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        gateway.shutdown().await;
    };

    run_server(app, addr, shutdown).await
}
