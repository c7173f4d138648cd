//! In-process transport
//!
//! Pairs a [`MemoryConnector`] with a [`MemoryListener`]. Each `connect` call
//! parks until the listener accepts or refuses it, so callers control exactly
//! when a connection opens. Used to drive the client without a network.

use super::{Connector, OutboundFrame, TransportEvent, TransportHandle};
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

struct PendingConnect {
    url: String,
    reply: oneshot::Sender<Result<TransportHandle, TransportError>>,
}

/// Client half: hands connect requests to the listener
#[derive(Clone)]
pub struct MemoryConnector {
    requests: mpsc::UnboundedSender<PendingConnect>,
}

/// Server half: accepts or refuses parked connect requests
pub struct MemoryListener {
    requests: mpsc::UnboundedReceiver<PendingConnect>,
}

/// Server view of one accepted connection
pub struct MemoryPeer {
    url: String,
    frames: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MemoryConnector {
    /// Create a connected connector/listener pair
    #[must_use]
    pub fn pair() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { requests: tx }, MemoryListener { requests: rx })
    }
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("listener_open", &!self.requests.is_closed())
            .finish()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<TransportHandle, TransportError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(PendingConnect {
                url: url.to_string(),
                reply,
            })
            .map_err(|_| TransportError::Connect("listener closed".to_string()))?;

        response
            .await
            .map_err(|_| TransportError::Connect("listener dropped request".to_string()))?
    }
}

impl MemoryListener {
    /// Accept the next connect request
    ///
    /// Returns `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        let pending = self.requests.recv().await?;

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = pending.reply.send(Ok(TransportHandle {
            outbound: frames_tx,
            inbound: events_rx,
        }));

        Some(MemoryPeer {
            url: pending.url,
            frames: frames_rx,
            events: events_tx,
        })
    }

    /// Fail the next connect request with `error`
    ///
    /// Returns the URL the client tried, or `None` once every connector is gone.
    pub async fn refuse(&mut self, error: TransportError) -> Option<String> {
        let pending = self.requests.recv().await?;
        let _ = pending.reply.send(Err(error));
        Some(pending.url)
    }

    /// Check if a connect request is waiting without blocking
    pub fn has_pending(&self) -> bool {
        !self.requests.is_empty()
    }
}

impl MemoryPeer {
    /// URL the client connected to
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the next frame the client writes
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.frames.recv().await
    }

    /// Take the next written frame if one is already queued
    pub fn try_next_frame(&mut self) -> Option<OutboundFrame> {
        self.frames.try_recv().ok()
    }

    /// Drain every frame already written
    pub fn drain_frames(&mut self) -> Vec<OutboundFrame> {
        std::iter::from_fn(|| self.frames.try_recv().ok()).collect()
    }

    /// Deliver a text frame to the client
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Frame(text.into())).is_ok()
    }

    /// Close the connection from the server side
    pub fn close(&self, code: Option<u16>, reason: impl Into<String>) -> bool {
        self.events
            .send(TransportEvent::Closed {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }

    /// Fail the connection with a transport error
    pub fn fail(&self, error: TransportError) -> bool {
        self.events.send(TransportEvent::Error(error)).is_ok()
    }

    /// Check if the client dropped its writer
    #[must_use]
    pub fn is_client_gone(&self) -> bool {
        self.events.is_closed()
    }
}
