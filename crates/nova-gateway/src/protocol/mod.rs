//! Node wire protocol
//!
//! Defines the JSON message format exchanged with node agents and the close codes
//! the gateway uses when it ends a connection.

mod close_codes;
mod message_type;
mod messages;

pub use close_codes::CloseCode;
pub use message_type::MessageType;
pub use messages::{NodeMessage, Payload, ReceiveScope};
