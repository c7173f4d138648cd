//! # chat-core
//!
//! Wire model for the chat protocol: the message type set, the [`Message`]
//! sum type, and the JSON envelope codec.
//! This crate performs no I/O.

pub mod codec;
pub mod protocol;

// Re-export commonly used types at crate root
pub use codec::{Codec, DecodeError, PublicPayloadFormat};
pub use protocol::{Message, MessageType};
