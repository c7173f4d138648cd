//! Chat protocol definitions
//!
//! Defines the message model, type tags, and wire payload shapes.

mod message;
mod message_type;
pub(crate) mod payloads;

pub use message::Message;
pub use message_type::MessageType;
