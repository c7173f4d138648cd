//! Client error types

use chat_common::ConfigError;
use chat_core::{DecodeError, MessageType};
use thiserror::Error;

/// Outbound buffer overflowed and dropped its oldest entry
///
/// The message that triggered the overflow is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Outbound queue full (capacity {capacity}), dropped oldest {evicted} message")]
pub struct QueueFull {
    pub capacity: usize,
    pub evicted: MessageType,
}

/// Errors returned from `send`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// Connection is closing or closed and buffering is off
    #[error("Not connected")]
    NotConnected,

    /// Message was buffered, but the oldest buffered message was dropped
    #[error("Outbound queue full, dropped oldest {evicted} message")]
    QueueFull { evicted: MessageType },

    /// The server does not accept this message type
    #[error("Server does not accept {0} messages")]
    UnsupportedType(MessageType),
}

impl SendError {
    /// Check if the message was still accepted for delivery
    #[must_use]
    pub const fn message_kept(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

impl From<QueueFull> for SendError {
    fn from(full: QueueFull) -> Self {
        Self::QueueFull {
            evicted: full.evicted,
        }
    }
}

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Umbrella error for the client facade
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
