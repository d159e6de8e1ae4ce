//! Outbound fan-out
//!
//! Best-effort delivery of gateway messages to every node or to one node.

mod dispatcher;

pub use dispatcher::NodeBroadcaster;
