//! Node message format
//!
//! Defines the structure of every text frame exchanged with a node.

use super::MessageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Who a message is addressed to, as grouping metadata
///
/// The gateway routes by node only; the scope is carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiveScope {
    User,
    Namespace,
    #[serde(other)]
    Other,
}

/// Message body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    pub title: String,
    pub message: String,
    pub status: String,
}

impl Payload {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            status: status.into(),
        }
    }
}

/// A message exchanged with a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMessage {
    /// Message type tag
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default)]
    pub payload: Payload,

    #[serde(default)]
    pub receiver_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_scope: Option<ReceiveScope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NodeMessage {
    /// Create a message of the given type, stamped with the current time
    #[must_use]
    pub fn new(kind: MessageType, payload: Payload) -> Self {
        Self {
            kind,
            payload,
            receiver_name: String::new(),
            receive_scope: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a status message
    #[must_use]
    pub fn status(payload: Payload) -> Self {
        Self::new(MessageType::StatusMsg, payload)
    }

    /// Create the reply to an application-level ping
    ///
    /// The payload names the endpoint the gateway observed for the sender.
    #[must_use]
    pub fn pong(remote_addr: SocketAddr) -> Self {
        Self::new(
            MessageType::Pong,
            Payload {
                message: format!("nova pong from {remote_addr}"),
                status: "success".to_string(),
                ..Payload::default()
            },
        )
    }

    /// Address the message to a receiver
    #[must_use]
    pub fn with_receiver(mut self, name: impl Into<String>, scope: ReceiveScope) -> Self {
        self.receiver_name = name.into();
        self.receive_scope = Some(scope);
        self
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for NodeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeMessage(type={}", self.kind)?;
        if !self.receiver_name.is_empty() {
            write!(f, ", receiver={}", self.receiver_name)?;
        }
        write!(f, ")")
    }
}
