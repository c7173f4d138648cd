//! Transport seam
//!
//! A [`Connector`] opens a full-duplex text channel to the server and hands
//! back a [`TransportHandle`]: an outbound sender and an inbound event stream.
//! The connection manager never touches sockets directly.

pub mod memory;
pub mod websocket;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::WebSocketConnector;

use crate::connection::CloseCode;
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Frame written by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A text frame carrying one encoded envelope
    Text(String),
    /// Close handshake request
    Close { code: CloseCode, reason: String },
}

impl OutboundFrame {
    /// Get the text payload, if this is a text frame
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Close { .. } => None,
        }
    }
}

/// Event surfaced by an open transport
///
/// A transport emits exactly one terminal event (`Closed` or `Error`) and then
/// stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the server
    Frame(String),
    /// The connection closed, with the close frame if the peer sent one
    Closed { code: Option<u16>, reason: String },
    /// The connection failed
    Error(TransportError),
}

/// Both ends of an open transport, as seen by the client
#[derive(Debug)]
pub struct TransportHandle {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens transports to a server endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`
    ///
    /// Resolves once the transport is open and ready for frames.
    async fn connect(&self, url: &str) -> Result<TransportHandle, TransportError>;
}
