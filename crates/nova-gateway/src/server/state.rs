//! Gateway state
//!
//! Application state for the gateway server.

use crate::NodeGateway;
use std::sync::Arc;

/// Gateway application state
///
/// Cheap to clone; every handler gets its own copy.
#[derive(Clone)]
pub struct GatewayState {
    /// Node connection manager, also shared with business-layer callers
    gateway: Arc<NodeGateway>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(gateway: Arc<NodeGateway>) -> Self {
        Self { gateway }
    }

    /// Get the node gateway
    pub fn gateway(&self) -> &NodeGateway {
        &self.gateway
    }

    /// Get a shared handle to the node gateway
    pub fn gateway_handle(&self) -> Arc<NodeGateway> {
        self.gateway.clone()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("gateway", &self.gateway)
            .finish()
    }
}
