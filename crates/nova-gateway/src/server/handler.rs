//! WebSocket handler
//!
//! Upgrades node connections and runs the per-connection read loop and writer
//! task.

use crate::connection::{CloseReason, NodeConnection, Outbound};
use crate::handlers::{GatewayError, HandlerResult, MessageDispatcher};
use crate::server::GatewayState;
use crate::NodeGateway;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Query string of the upgrade request
#[derive(Debug, Deserialize)]
pub struct HandshakeParams {
    /// Node identifier
    pub identifier: Option<String>,
}

/// Node WebSocket handler
///
/// Rejects requests without a usable `identifier` before upgrading.
pub async fn node_socket_handler(
    State(state): State<GatewayState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HandshakeParams>,
    ws: WebSocketUpgrade,
) -> HandlerResult<Response> {
    let node_id = params
        .identifier
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| GatewayError::Handshake("missing identifier".to_string()))?;

    if state.gateway().is_shutting_down() {
        return Err(GatewayError::ShuttingDown);
    }

    tracing::debug!(node_id = %node_id, remote_addr = %remote_addr, "Upgrading node connection");

    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, node_id, remote_addr)))
}

/// Handle an upgraded node connection until it closes
async fn handle_socket(state: GatewayState, socket: WebSocket, node_id: String, remote_addr: SocketAddr) {
    let gateway = state.gateway();
    let config = gateway.config();

    let (tx, rx) = mpsc::channel(config.outbound_buffer);
    let connection = gateway.registry().register(node_id, tx, remote_addr);

    // Shutdown may have drained the registry between the upgrade and register
    if gateway.is_shutting_down() {
        connection.close(CloseReason::Shutdown);
    }

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(connection.clone(), sink, rx, config.write_timeout()));

    let exit = read_loop(gateway, &connection, stream).await;

    gateway.registry().unregister(connection.node_id(), connection.id());
    if let Some(reason) = exit {
        connection.close(reason);
    }

    if let Err(e) = writer.await {
        tracing::warn!(connection_id = %connection.id(), error = %e, "Writer task failed");
    }

    tracing::debug!(
        node_id = %connection.node_id(),
        connection_id = %connection.id(),
        reason = ?connection.close_reason(),
        "Node connection finished"
    );
}

/// Read frames until the peer goes away or the connection is closed elsewhere
///
/// Returns the close reason when the read side ended the connection, `None`
/// when someone else closed it first.
async fn read_loop(
    gateway: &NodeGateway,
    connection: &Arc<NodeConnection>,
    mut stream: SplitStream<WebSocket>,
) -> Option<CloseReason> {
    loop {
        let frame = tokio::select! {
            () = connection.closed() => return None,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                MessageDispatcher::handle_text(gateway, connection, &text).await;
            }
            Some(Ok(Message::Pong(_))) => {
                connection.record_pong();
                tracing::trace!(connection_id = %connection.id(), "Heartbeat pong received");
            }
            Some(Ok(Message::Ping(_))) => {
                // Answered by the WebSocket layer
                tracing::trace!(connection_id = %connection.id(), "Ping received");
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(connection_id = %connection.id(), "Binary frames are not supported");
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!(
                    node_id = %connection.node_id(),
                    connection_id = %connection.id(),
                    "Node closed connection"
                );
                return Some(CloseReason::PeerClosed);
            }
            Some(Err(e)) => {
                tracing::warn!(
                    node_id = %connection.node_id(),
                    connection_id = %connection.id(),
                    error = %e,
                    "WebSocket read error"
                );
                return Some(CloseReason::ReadError);
            }
        }
    }
}

/// Drain the outbound queue into the socket until the connection closes
async fn write_loop(
    connection: Arc<NodeConnection>,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    write_timeout: Duration,
) {
    let pump = async {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Outbound::Text(text) => Message::Text(text.to_string()),
                Outbound::Probe => Message::Ping(Vec::new()),
            };

            match timeout(write_timeout, sink.send(message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Some(GatewayError::Transport(e.to_string())),
                Err(_) => return Some(GatewayError::WriteTimeout(write_timeout)),
            }
        }
        None
    };

    let failure = tokio::select! {
        failure = pump => failure,
        () = connection.closed() => None,
    };

    if let Some(e) = failure {
        tracing::warn!(
            node_id = %connection.node_id(),
            connection_id = %connection.id(),
            error = %e,
            "Failed to write to node"
        );
        connection.close(CloseReason::WriteError);
    }

    if let Some(reason) = connection.close_reason().filter(|r| r.is_gateway_initiated()) {
        let code = reason.close_code();
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: code.description().into(),
        };
        let _ = timeout(write_timeout, sink.send(Message::Close(Some(frame)))).await;
    }

    let _ = timeout(write_timeout, sink.close()).await;
}
