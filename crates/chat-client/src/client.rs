//! Chat client facade
//!
//! Wires the codec, dispatch queue and connection manager together behind a
//! small API: connect, send typed messages, subscribe to decoded inbound
//! messages.

use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState, FrameHandler};
use crate::dispatch::{DispatchQueue, SubscriptionHandle};
use crate::error::{ClientError, SendError, TransportError};
use crate::transport::{Connector, WebSocketConnector};
use chat_common::ClientConfig;
use chat_core::{Codec, Message};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Longest prefix of an undecodable frame written to the log
const LOGGED_FRAME_LIMIT: usize = 256;

/// High-level chat client
#[derive(Debug, Clone)]
pub struct ChatClient {
    manager: ConnectionManager,
    dispatch: Arc<DispatchQueue>,
}

impl ChatClient {
    /// Create a client that talks WebSocket to `config.server_url`
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] if the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client over a custom transport
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] if the configuration is invalid.
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let dispatch = Arc::new(DispatchQueue::new(config.queue.capacity));
        let codec = Codec::new(config.public_format);

        let inbound = Arc::clone(&dispatch);
        let on_frame: FrameHandler = Arc::new(move |frame: &str| match codec.decode(frame) {
            Ok(message) => {
                inbound.publish_inbound(&message);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    code = e.code(),
                    frame = %truncate(frame, LOGGED_FRAME_LIMIT),
                    "Discarding undecodable frame"
                );
            }
        });

        let manager = ConnectionManager::new(&config, connector, Arc::clone(&dispatch), on_frame);

        Ok(Self { manager, dispatch })
    }

    /// Start connecting; see [`ConnectionManager::connect`]
    pub fn connect(&self) {
        self.manager.connect();
    }

    /// Connect again after a disconnect
    ///
    /// No-op while a connection is open or opening.
    pub fn reconnect(&self) {
        self.manager.connect();
    }

    /// Close the connection with a normal close code
    pub fn disconnect(&self, reason: &str) {
        self.manager.close(reason);
    }

    /// Send a message
    ///
    /// # Errors
    /// See [`ConnectionManager::send`].
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        self.manager.send(message)
    }

    /// Send a PUBLIC message to every connected user
    ///
    /// # Errors
    /// See [`ConnectionManager::send`].
    pub fn send_public(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.send(Message::public(text))
    }

    /// Send a PRIVATE message to one user
    ///
    /// # Errors
    /// See [`ConnectionManager::send`].
    pub fn send_private(
        &self,
        text: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<(), SendError> {
        self.send(Message::private(text, to))
    }

    /// Announce departure, then close if the connection is open
    ///
    /// While still connecting the QUIT is buffered and goes out on open. A
    /// server without QUIT support gets a plain close instead.
    ///
    /// # Errors
    /// See [`ConnectionManager::send`]; `UnsupportedType` is not returned.
    pub fn quit(&self, reason: Option<&str>) -> Result<(), SendError> {
        let connected = self.is_connected();
        match self.send(Message::quit(reason)) {
            Ok(()) if !connected => return Ok(()),
            Ok(()) => {}
            Err(SendError::UnsupportedType(_)) => {
                tracing::debug!("Server does not accept QUIT, closing directly");
            }
            Err(e) => return Err(e),
        }
        self.manager.close(reason.unwrap_or("quit"));
        Ok(())
    }

    /// Register a callback for decoded inbound messages
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.dispatch.subscribe(callback)
    }

    /// Remove an inbound callback, returning false if it was not registered
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.dispatch.unsubscribe(handle)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Receive lifecycle events raised after this call
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.manager.events()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.subscribe_state()
    }

    /// Number of sends buffered until the transport opens
    #[must_use]
    pub fn pending_sends(&self) -> usize {
        self.dispatch.pending_len()
    }

    /// Underlying connection manager
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Wait for the current connect attempt to open
    ///
    /// With automatic reconnect enabled, keeps waiting across failed
    /// attempts; wrap in `tokio::time::timeout` to bound the wait.
    ///
    /// # Errors
    /// - [`ClientError::Send`] with [`SendError::NotConnected`] if no attempt
    ///   is in progress
    /// - [`ClientError::Transport`] if the attempt fails and no reconnect
    ///   follows
    pub async fn wait_until_connected(&self) -> Result<(), ClientError> {
        let mut events = self.events();
        let reconnecting = self.manager.config().auto_reconnect.enabled;

        match self.state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected if self.manager.is_reconnect_pending() => {}
            _ => return Err(SendError::NotConnected.into()),
        }

        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Opened) => return Ok(()),
                Ok(ConnectionEvent::Closed { reason, .. }) if !reconnecting => {
                    return Err(TransportError::Connect(reason).into());
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if self.is_connected() {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SendError::NotConnected.into());
                }
            }
        }
    }

    /// Wait until the connection reaches `Disconnected`
    pub async fn wait_until_disconnected(&self) {
        let mut state = self.subscribe_state();
        // The sender lives as long as `self`
        let _ = state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await;
    }
}

fn truncate(frame: &str, limit: usize) -> &str {
    if frame.len() <= limit {
        return frame;
    }
    let mut end = limit;
    while !frame.is_char_boundary(end) {
        end -= 1;
    }
    &frame[..end]
}
