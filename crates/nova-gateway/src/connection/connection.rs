//! Individual node connection
//!
//! Bookkeeping for one physical WebSocket connection to a node.

use crate::handlers::GatewayError;
use crate::protocol::{CloseCode, NodeMessage};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Identity of one connection record
pub type ConnectionId = Uuid;

/// Frame queued for the connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized JSON message
    Text(Arc<str>),
    /// Transport-level liveness probe (WebSocket ping)
    Probe,
}

/// Connection state
///
/// A handshake that fails never produces a record, so records start out `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and exchanging frames
    Active,
    /// Closed; terminal
    Closed,
}

/// Why a connection left the `Active` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The node sent a close frame or the stream ended
    PeerClosed,
    /// Reading from the socket failed
    ReadError,
    /// Writing to the socket failed or stalled
    WriteError,
    /// A heartbeat probe could not be written
    ProbeFailed,
    /// Too many heartbeat probes went unanswered
    HeartbeatTimeout,
    /// The gateway is shutting down
    Shutdown,
}

impl CloseReason {
    /// Close code sent to the node for this reason
    #[must_use]
    pub const fn close_code(self) -> CloseCode {
        match self {
            Self::PeerClosed => CloseCode::Normal,
            Self::ReadError | Self::WriteError | Self::ProbeFailed => CloseCode::TransportError,
            Self::HeartbeatTimeout => CloseCode::HeartbeatTimeout,
            Self::Shutdown => CloseCode::GoingAway,
        }
    }

    /// Whether the gateway ended the connection while the peer may still listen
    #[must_use]
    pub const fn is_gateway_initiated(self) -> bool {
        matches!(self, Self::ProbeFailed | Self::HeartbeatTimeout | Self::Shutdown)
    }
}

#[derive(Debug)]
struct Liveness {
    last_pong_at: DateTime<Utc>,
    missed_heartbeats: u32,
}

/// A single node connection
pub struct NodeConnection {
    /// Unique connection ID
    id: ConnectionId,

    /// Node identifier supplied at handshake
    node_id: String,

    /// Endpoint the gateway observed for the node
    remote_addr: SocketAddr,

    /// Registration time
    connected_at: DateTime<Utc>,

    /// Heartbeat bookkeeping, shared by the read loop and the sweep
    liveness: Mutex<Liveness>,

    /// Outbound queue drained by the writer task
    sender: mpsc::Sender<Outbound>,

    /// Set once, by whoever closes the connection first
    close_reason: Mutex<Option<CloseReason>>,

    /// Flipped to `true` on close
    closed: watch::Sender<bool>,
}

impl NodeConnection {
    /// Create a new connection
    pub fn new(node_id: String, sender: mpsc::Sender<Outbound>, remote_addr: SocketAddr) -> Arc<Self> {
        let now = Utc::now();
        let (closed, _) = watch::channel(false);

        Arc::new(Self {
            id: Uuid::new_v4(),
            node_id,
            remote_addr,
            connected_at: now,
            liveness: Mutex::new(Liveness {
                last_pong_at: now,
                missed_heartbeats: 0,
            }),
            sender,
            close_reason: Mutex::new(None),
            closed,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Time of the last liveness response (registration time if none yet)
    pub fn last_pong_at(&self) -> DateTime<Utc> {
        self.liveness.lock().last_pong_at
    }

    /// Sweeps since the last liveness response
    pub fn missed_heartbeats(&self) -> u32 {
        self.liveness.lock().missed_heartbeats
    }

    /// Record a liveness response from the node
    pub fn record_pong(&self) {
        let mut liveness = self.liveness.lock();
        liveness.last_pong_at = Utc::now();
        liveness.missed_heartbeats = 0;
    }

    /// Count one more unanswered probe and return the new total
    pub fn record_missed_heartbeat(&self) -> u32 {
        let mut liveness = self.liveness.lock();
        liveness.missed_heartbeats = liveness.missed_heartbeats.saturating_add(1);
        liveness.missed_heartbeats
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        if self.close_reason.lock().is_some() {
            ConnectionState::Closed
        } else {
            ConnectionState::Active
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Reason recorded by the first `close` call
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.close_reason.lock()
    }

    /// Close the connection
    ///
    /// Only the first call has an effect; it records the reason and wakes the read
    /// loop and writer task. Returns whether this call performed the close.
    pub fn close(&self, reason: CloseReason) -> bool {
        {
            let mut current = self.close_reason.lock();
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
        }

        self.closed.send_replace(true);

        tracing::debug!(
            node_id = %self.node_id,
            connection_id = %self.id,
            reason = ?reason,
            "Connection closed"
        );

        true
    }

    /// Resolve once the connection has been closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Queue an already-serialized message, waiting at most `timeout` for room
    pub async fn send_text(&self, text: Arc<str>, timeout: Duration) -> Result<(), GatewayError> {
        self.enqueue(Outbound::Text(text), timeout).await
    }

    /// Serialize and queue a message
    pub async fn send_message(&self, message: &NodeMessage, timeout: Duration) -> Result<(), GatewayError> {
        let json = message.to_json().map_err(GatewayError::Encode)?;
        self.send_text(Arc::from(json), timeout).await
    }

    /// Queue a transport-level liveness probe
    pub async fn send_probe(&self, timeout: Duration) -> Result<(), GatewayError> {
        self.enqueue(Outbound::Probe, timeout).await
    }

    async fn enqueue(&self, frame: Outbound, timeout: Duration) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::Transport("connection closed".to_string()));
        }

        self.sender
            .send_timeout(frame, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => GatewayError::WriteTimeout(timeout),
                mpsc::error::SendTimeoutError::Closed(_) => {
                    GatewayError::Transport("writer task has stopped".to_string())
                }
            })
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("id", &self.id)
            .field("node_id", &self.node_id)
            .field("remote_addr", &self.remote_addr)
            .field("connected_at", &self.connected_at)
            .field("state", &self.state())
            .finish()
    }
}
