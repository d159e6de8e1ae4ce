//! Ping handler

use super::HandlerResult;
use crate::connection::NodeConnection;
use crate::protocol::NodeMessage;
use std::sync::Arc;
use std::time::Duration;

/// Answers application-level pings
pub struct PingHandler;

impl PingHandler {
    /// Reply with a pong naming the endpoint the node connected from
    pub async fn handle(connection: &Arc<NodeConnection>, write_timeout: Duration) -> HandlerResult<()> {
        let reply = NodeMessage::pong(connection.remote_addr());
        connection.send_message(&reply, write_timeout).await?;

        tracing::trace!(
            node_id = %connection.node_id(),
            remote_addr = %connection.remote_addr(),
            "Pong sent"
        );

        Ok(())
    }
}
