//! Gateway error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Upgrade request rejected before any registration
    #[error("Handshake rejected: {0}")]
    Handshake(String),

    /// Gateway no longer accepts connections
    #[error("Gateway is shutting down")]
    ShuttingDown,

    /// Inbound frame is not a valid message
    #[error("Malformed frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// Outbound message could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Read or write on the connection failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Outbound queue stayed full for the whole write window
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Heartbeat probes went unanswered too many times
    #[error("No heartbeat response for {missed} sweeps")]
    LivenessTimeout { missed: u32 },
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Handshake(_) => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, GatewayError>;
