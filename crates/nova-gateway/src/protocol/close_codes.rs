//! WebSocket close codes
//!
//! Close codes the gateway sends when it ends a node connection.

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Connection finished normally
    Normal = 1000,
    /// Gateway is shutting down
    GoingAway = 1001,
    /// Node stopped answering heartbeat probes
    HeartbeatTimeout = 4000,
    /// A read or write on the connection failed
    TransportError = 4001,
}

impl CloseCode {
    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Connection closed",
            Self::GoingAway => "Gateway shutting down",
            Self::HeartbeatTimeout => "Heartbeat timeout",
            Self::TransportError => "Transport error",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
