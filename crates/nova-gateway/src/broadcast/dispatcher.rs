//! Node broadcaster
//!
//! Serializes a message once and queues it on every target connection. Writes
//! happen on a snapshot, outside the registry lock, each bounded by the write
//! timeout. Failures are logged and left for the heartbeat to clean up.

use crate::connection::{ConnectionRegistry, NodeConnection};
use crate::handlers::GatewayError;
use crate::protocol::NodeMessage;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Broadcasts messages to connected nodes
pub struct NodeBroadcaster {
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
}

impl NodeBroadcaster {
    /// Create a new broadcaster
    pub fn new(registry: Arc<ConnectionRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Send a message to every connection of every node
    pub async fn broadcast_to_all(&self, message: &NodeMessage) {
        let Some(text) = Self::encode(message) else {
            return;
        };

        let targets = self.registry.connections();
        tracing::debug!(
            message_type = %message.kind,
            targets = targets.len(),
            "Broadcasting to all nodes"
        );

        self.deliver(targets, text).await;
    }

    /// Send a message to every connection of one node
    ///
    /// An unknown node is logged and otherwise ignored.
    pub async fn broadcast_to_node(&self, node_id: &str, message: &NodeMessage) {
        let Some(targets) = self.registry.node_connections(node_id) else {
            tracing::warn!(node_id = %node_id, "No active connections for node");
            return;
        };

        let Some(text) = Self::encode(message) else {
            return;
        };

        tracing::debug!(
            node_id = %node_id,
            message_type = %message.kind,
            targets = targets.len(),
            "Broadcasting to node"
        );

        self.deliver(targets, text).await;
    }

    fn encode(message: &NodeMessage) -> Option<Arc<str>> {
        match message.to_json().map_err(GatewayError::Encode) {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                tracing::error!(message_type = %message.kind, error = %e, "Dropping broadcast");
                None
            }
        }
    }

    async fn deliver(&self, targets: Vec<Arc<NodeConnection>>, text: Arc<str>) {
        let sends = targets.iter().map(|connection| {
            let text = text.clone();
            async move {
                if let Err(e) = connection.send_text(text, self.write_timeout).await {
                    tracing::warn!(
                        node_id = %connection.node_id(),
                        connection_id = %connection.id(),
                        error = %e,
                        "Failed to deliver broadcast"
                    );
                }
            }
        });

        join_all(sends).await;
    }
}

impl std::fmt::Debug for NodeBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBroadcaster")
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
