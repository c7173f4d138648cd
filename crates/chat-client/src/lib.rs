//! # chat-client
//!
//! Client side of the chat protocol: a single logical connection with
//! buffered sends, keepalive, optional automatic reconnect, and typed
//! inbound message delivery.

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod keepalive;
pub mod transport;

// Re-export commonly used types at crate root
pub use client::ChatClient;
pub use connection::{CloseCode, ConnectionEvent, ConnectionManager, ConnectionState};
pub use dispatch::{DispatchQueue, SubscriptionHandle};
pub use error::{ClientError, QueueFull, SendError, TransportError};
pub use transport::{Connector, WebSocketConnector};
