//! # nova-gateway
//!
//! WebSocket connection manager for remote node agents: a registry of live
//! connections, heartbeat-based liveness and best-effort fan-out.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod heartbeat;
pub mod protocol;
pub mod server;

mod gateway;

pub use gateway::NodeGateway;
pub use server::run;
