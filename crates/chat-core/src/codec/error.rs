//! Decode error types

use thiserror::Error;

/// Reasons an inbound frame could not be turned into a [`Message`](crate::Message)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame is not a `{type, payload}` object, or the payload has the wrong shape
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope parsed but its `type` is not a known message type
    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

impl DecodeError {
    /// Get a short error code for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope(_) => "MALFORMED_ENVELOPE",
            Self::UnknownType(_) => "UNKNOWN_TYPE",
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedEnvelope(err.to_string())
    }
}
