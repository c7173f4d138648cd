//! WebSocket transport backed by tokio-tungstenite

use super::{Connector, OutboundFrame, TransportEvent, TransportHandle};
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{frame::coding::CloseCode as WsCloseCode, CloseFrame},
    Message,
};

/// Connects to `ws://` and `wss://` endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<TransportHandle, TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| match e {
                tungstenite::Error::Url(err) => TransportError::InvalidEndpoint(err.to_string()),
                other => TransportError::Connect(other.to_string()),
            })?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // Writer: drains outbound frames until the client drops its sender
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let message = match frame {
                    OutboundFrame::Text(text) => Message::Text(text),
                    OutboundFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
                        code: WsCloseCode::from(code.as_u16()),
                        reason: Cow::Owned(reason),
                    })),
                };
                if let Err(e) = ws_sink.send(message).await {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    break;
                }
            }

            let _ = ws_sink.close().await;
        });

        // Reader: forwards text frames and reports exactly one terminal event
        tokio::spawn(async move {
            let terminal = loop {
                match ws_stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(TransportEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!(len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                        tracing::trace!("Control frame received");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => TransportEvent::Closed {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.into_owned(),
                            },
                            None => TransportEvent::Closed {
                                code: None,
                                reason: String::new(),
                            },
                        };
                    }
                    Some(Err(e)) => break TransportEvent::Error(TransportError::Io(e.to_string())),
                    None => {
                        break TransportEvent::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        }
                    }
                }
            };

            let _ = inbound_tx.send(terminal);
        });

        Ok(TransportHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
