//! Status message handler
//!
//! Hands node status reports to the business layer.

use crate::connection::NodeConnection;
use crate::protocol::NodeMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives control messages that nodes send to the gateway
///
/// Implemented by the business layer and installed with
/// [`NodeGateway::with_control_handler`](crate::NodeGateway::with_control_handler).
/// Called from the node's read loop, so slow implementations delay that node's
/// next frame.
#[async_trait]
pub trait ControlMessageHandler: Send + Sync {
    async fn on_control_message(&self, node_id: &str, message: NodeMessage);
}

/// Routes `statusMsg` frames
pub struct StatusHandler;

impl StatusHandler {
    pub async fn handle(
        handler: Option<&Arc<dyn ControlMessageHandler>>,
        connection: &Arc<NodeConnection>,
        message: NodeMessage,
    ) {
        match handler {
            Some(handler) => handler.on_control_message(connection.node_id(), message).await,
            None => {
                tracing::debug!(
                    node_id = %connection.node_id(),
                    title = %message.payload.title,
                    status = %message.payload.status,
                    "Status message received with no control handler installed"
                );
            }
        }
    }
}
