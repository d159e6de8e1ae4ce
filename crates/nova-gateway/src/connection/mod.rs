//! Connection management
//!
//! Per-connection records and the registry that groups them by node.

mod connection;
mod registry;

pub use connection::{CloseReason, ConnectionId, ConnectionState, NodeConnection, Outbound};
pub use registry::ConnectionRegistry;
