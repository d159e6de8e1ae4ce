//! Node gateway
//!
//! The single object the rest of the application holds: it owns the registry,
//! the heartbeat monitor and the broadcaster, and publishes the query and
//! broadcast surface used by the business layer.

use crate::broadcast::NodeBroadcaster;
use crate::connection::{CloseReason, ConnectionRegistry};
use crate::handlers::ControlMessageHandler;
use crate::heartbeat::HeartbeatMonitor;
use crate::protocol::NodeMessage;
use nova_common::{ConfigError, HeartbeatConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Node connection manager
///
/// Build one per process, share it through `Arc`.
pub struct NodeGateway {
    registry: Arc<ConnectionRegistry>,
    broadcaster: NodeBroadcaster,
    config: HeartbeatConfig,
    control_handler: Option<Arc<dyn ControlMessageHandler>>,
    /// Flipped to `true` once by `shutdown`
    stop: watch::Sender<bool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl NodeGateway {
    /// Create a gateway with an empty registry
    ///
    /// The heartbeat monitor does not run until [`start`](Self::start) is called.
    /// Fails if any heartbeat setting is zero.
    pub fn new(config: HeartbeatConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = ConnectionRegistry::new_shared();
        let broadcaster = NodeBroadcaster::new(registry.clone(), config.write_timeout());
        let (stop, _) = watch::channel(false);

        Ok(Self {
            registry,
            broadcaster,
            config,
            control_handler: None,
            stop,
            monitor: Mutex::new(None),
        })
    }

    /// Install the receiver for node status messages
    pub fn with_control_handler(mut self, handler: Arc<dyn ControlMessageHandler>) -> Self {
        self.control_handler = Some(handler);
        self
    }

    /// Start the heartbeat monitor
    ///
    /// Must be called from within a Tokio runtime. Later calls are ignored.
    pub fn start(&self) {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            tracing::warn!("Heartbeat monitor is already running");
            return;
        }

        let handle = HeartbeatMonitor::new(self.registry.clone(), &self.config).spawn(self.stop.subscribe());
        *monitor = Some(handle);
    }

    /// Send a message to every connected node
    pub async fn broadcast_to_all_nodes(&self, message: &NodeMessage) {
        self.broadcaster.broadcast_to_all(message).await;
    }

    /// Send a message to every connection of one node
    pub async fn broadcast_to_node(&self, node_id: &str, message: &NodeMessage) {
        self.broadcaster.broadcast_to_node(node_id, message).await;
    }

    /// Number of open connections across all nodes
    pub fn total_connections(&self) -> usize {
        self.registry.total_connections()
    }

    /// Number of nodes with at least one open connection
    pub fn active_node_count(&self) -> usize {
        self.registry.node_count()
    }

    /// Identifiers of the connected nodes, sorted
    pub fn active_node_ids(&self) -> Vec<String> {
        self.registry.node_ids()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.stop.borrow()
    }

    /// Stop the heartbeat monitor and close every connection
    ///
    /// Only the first call does anything.
    pub async fn shutdown(&self) {
        if self.stop.send_replace(true) {
            return;
        }
        tracing::info!("Shutting down node gateway");

        let handle = self.monitor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Heartbeat monitor ended abnormally");
            }
        }

        let connections = self.registry.drain();
        for connection in &connections {
            connection.close(CloseReason::Shutdown);
        }

        tracing::info!(closed = connections.len(), "Node gateway stopped");
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub(crate) fn control_handler(&self) -> Option<&Arc<dyn ControlMessageHandler>> {
        self.control_handler.as_ref()
    }
}

impl std::fmt::Debug for NodeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGateway")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("control_handler", &self.control_handler.is_some())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
