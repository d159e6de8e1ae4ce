//! Inbound message handlers
//!
//! Routes decoded node messages by their type. Nothing in here ever ends a
//! connection: malformed frames, unknown types and failed replies are logged and
//! the read loop moves on to the next frame.

mod error;
mod ping;
mod status;

pub use error::{GatewayError, HandlerResult};
pub use ping::PingHandler;
pub use status::{ControlMessageHandler, StatusHandler};

use crate::connection::NodeConnection;
use crate::protocol::{MessageType, NodeMessage};
use crate::NodeGateway;
use std::sync::Arc;

/// Dispatch incoming node messages to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Decode a text frame and dispatch it
    pub async fn handle_text(gateway: &NodeGateway, connection: &Arc<NodeConnection>, text: &str) {
        let message = match NodeMessage::from_json(text).map_err(GatewayError::Decode) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    node_id = %connection.node_id(),
                    connection_id = %connection.id(),
                    error = %e,
                    "Skipping undecodable frame"
                );
                return;
            }
        };

        if let Err(e) = Self::dispatch(gateway, connection, message).await {
            tracing::warn!(
                node_id = %connection.node_id(),
                connection_id = %connection.id(),
                error = %e,
                "Node message handling failed"
            );
        }
    }

    /// Handle a decoded node message
    pub async fn dispatch(
        gateway: &NodeGateway,
        connection: &Arc<NodeConnection>,
        message: NodeMessage,
    ) -> HandlerResult<()> {
        tracing::trace!(
            node_id = %connection.node_id(),
            message_type = %message.kind,
            "Received message"
        );

        match message.kind.clone() {
            MessageType::Ping => PingHandler::handle(connection, gateway.config().write_timeout()).await,
            MessageType::Pong => {
                // Application-level pong; liveness is tracked on protocol pongs only
                tracing::trace!(node_id = %connection.node_id(), "Pong message received");
                Ok(())
            }
            MessageType::StatusMsg => {
                StatusHandler::handle(gateway.control_handler(), connection, message).await;
                Ok(())
            }
            MessageType::Unknown(tag) => {
                tracing::warn!(
                    node_id = %connection.node_id(),
                    message_type = %tag,
                    "Unknown node message type"
                );
                Ok(())
            }
        }
    }
}
