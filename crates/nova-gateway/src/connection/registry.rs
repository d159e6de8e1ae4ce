//! Connection registry
//!
//! Maps node identifiers to their active connections. The whole map sits behind a
//! single reader-writer lock; queries take the read lock and every mutation takes
//! the write lock. Guards are never held across an `.await`.

use super::{ConnectionId, NodeConnection, Outbound};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Active node connections, grouped by node ID in registration order
///
/// A node key is present only while it has at least one connection.
pub struct ConnectionRegistry {
    nodes: RwLock<HashMap<String, Vec<Arc<NodeConnection>>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection for a node
    ///
    /// Always succeeds. A node may hold any number of connections at once.
    pub fn register(
        &self,
        node_id: impl Into<String>,
        sender: mpsc::Sender<Outbound>,
        remote_addr: SocketAddr,
    ) -> Arc<NodeConnection> {
        let connection = NodeConnection::new(node_id.into(), sender, remote_addr);

        let node_connections = {
            let mut nodes = self.nodes.write();
            let entry = nodes.entry(connection.node_id().to_string()).or_default();
            entry.push(connection.clone());
            entry.len()
        };

        tracing::info!(
            node_id = %connection.node_id(),
            connection_id = %connection.id(),
            remote_addr = %remote_addr,
            connections = node_connections,
            "Node connected"
        );

        connection
    }

    /// Remove one connection of a node
    ///
    /// Unknown nodes and connections are ignored, so concurrent or repeated calls for
    /// the same connection are harmless. Returns whether a connection was removed.
    pub fn unregister(&self, node_id: &str, connection_id: ConnectionId) -> bool {
        let remaining = {
            let mut nodes = self.nodes.write();
            let Some(connections) = nodes.get_mut(node_id) else {
                return false;
            };
            let Some(index) = connections.iter().position(|c| c.id() == connection_id) else {
                return false;
            };

            connections.remove(index);
            let remaining = connections.len();
            if remaining == 0 {
                nodes.remove(node_id);
            }
            remaining
        };

        tracing::info!(
            node_id = %node_id,
            connection_id = %connection_id,
            remaining = remaining,
            "Node connection removed"
        );
        if remaining == 0 {
            tracing::info!(node_id = %node_id, "All connections of node closed");
        }

        true
    }

    /// Remove a batch of connections in one write-locked pass
    ///
    /// Each affected node's list is rebuilt without the given connections and
    /// installed whole; nodes left without connections are deleted. Returns how
    /// many connections were actually removed.
    pub fn remove_connections(&self, dead: &[Arc<NodeConnection>]) -> usize {
        if dead.is_empty() {
            return 0;
        }

        let mut by_node: HashMap<&str, HashSet<ConnectionId>> = HashMap::new();
        for connection in dead {
            by_node
                .entry(connection.node_id())
                .or_default()
                .insert(connection.id());
        }

        let mut removed = 0;
        let mut emptied = Vec::new();
        {
            let mut nodes = self.nodes.write();
            for (node_id, ids) in by_node {
                let Some(current) = nodes.get(node_id) else {
                    continue;
                };

                let survivors: Vec<Arc<NodeConnection>> = current
                    .iter()
                    .filter(|c| !ids.contains(&c.id()))
                    .cloned()
                    .collect();
                removed += current.len() - survivors.len();

                if survivors.is_empty() {
                    nodes.remove(node_id);
                    emptied.push(node_id);
                } else {
                    nodes.insert(node_id.to_string(), survivors);
                }
            }
        }

        for node_id in emptied {
            tracing::info!(node_id = %node_id, "All connections of node closed");
        }

        removed
    }

    /// Take every connection out of the registry, leaving it empty
    pub fn drain(&self) -> Vec<Arc<NodeConnection>> {
        let nodes = std::mem::take(&mut *self.nodes.write());
        nodes.into_values().flatten().collect()
    }

    /// Copy of every node with its connections
    pub fn snapshot(&self) -> Vec<(String, Vec<Arc<NodeConnection>>)> {
        self.nodes
            .read()
            .iter()
            .map(|(node_id, connections)| (node_id.clone(), connections.clone()))
            .collect()
    }

    /// Copy of every connection across all nodes
    pub fn connections(&self) -> Vec<Arc<NodeConnection>> {
        self.nodes.read().values().flatten().cloned().collect()
    }

    /// Copy of one node's connections, if the node is connected
    pub fn node_connections(&self, node_id: &str) -> Option<Vec<Arc<NodeConnection>>> {
        self.nodes.read().get(node_id).cloned()
    }

    /// Get the total number of connections
    pub fn total_connections(&self) -> usize {
        self.nodes.read().values().map(Vec::len).sum()
    }

    /// Get the number of connected nodes
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Get the IDs of all connected nodes, sorted
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes = self.nodes.read();
        f.debug_struct("ConnectionRegistry")
            .field("nodes", &nodes.len())
            .field("connections", &nodes.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
