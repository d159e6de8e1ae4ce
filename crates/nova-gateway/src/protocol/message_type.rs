//! Node message types
//!
//! The `type` tag carried by every frame exchanged with a node.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Node message type
///
/// The set of known tags is closed; anything else decodes into `Unknown` so that a
/// newer agent never breaks an older gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Application-level liveness request
    Ping,
    /// Reply to `Ping`
    Pong,
    /// Status report or control instruction
    StatusMsg,
    /// Any tag this gateway does not understand
    Unknown(String),
}

impl MessageType {
    /// Map a raw wire tag to a message type
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "statusMsg" => Self::StatusMsg,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Get the wire tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::StatusMsg => "statusMsg",
            Self::Unknown(tag) => tag,
        }
    }
}

impl Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
