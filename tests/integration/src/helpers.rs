//! Test helpers for integration tests
//!
//! Provides an in-process WebSocket chat server that records what clients
//! send and lets tests push frames, close sessions, or drop them abruptly.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chat_client::ChatClient;
use chat_common::ClientConfig;
use chat_core::Message as ChatMessage;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default wait for anything observable in a test
pub const WAIT: Duration = Duration::from_secs(5);

/// Something the server observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client completed the WebSocket handshake
    Connected(usize),
    /// A client sent a text frame
    Frame { session: usize, text: String },
    /// A client went away
    Closed {
        session: usize,
        code: Option<u16>,
        reason: String,
    },
}

#[derive(Debug)]
enum SessionCommand {
    Send(String),
    Close(u16, String),
    Drop,
}

#[derive(Clone, Default)]
struct ServerState {
    sessions: Arc<Mutex<HashMap<usize, mpsc::UnboundedSender<SessionCommand>>>>,
    next_id: Arc<AtomicUsize>,
    events: Option<mpsc::UnboundedSender<ServerEvent>>,
    relay_public: bool,
}

impl ServerState {
    fn emit(&self, event: ServerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn broadcast(&self, text: &str) {
        for session in self.sessions.lock().values() {
            let _ = session.send(SessionCommand::Send(text.to_string()));
        }
    }
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    state: ServerState,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server that only records traffic
    pub async fn start() -> Result<Self> {
        Self::start_with(false).await
    }

    /// Start a server that also relays every PUBLIC frame to all sessions
    pub async fn start_relay() -> Result<Self> {
        Self::start_with(true).await
    }

    async fn start_with(relay_public: bool) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = ServerState {
            events: Some(events_tx),
            relay_public,
            ..ServerState::default()
        };

        let app = Router::new()
            .route("/websock", get(websock_handler))
            .with_state(state.clone());

        // Bind to an ephemeral port
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            events: events_rx,
            _handle: handle,
        })
    }

    /// WebSocket endpoint URL
    pub fn ws_url(&self) -> String {
        format!("ws://{}/websock", self.addr)
    }

    /// Client configuration pointing at this server
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::with_url(self.ws_url())
    }

    /// Wait for the next server event
    pub async fn next_event(&mut self) -> Result<ServerEvent> {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .context("timed out waiting for server event")?
            .context("server stopped")
    }

    /// Wait for the next connection and return its session id
    pub async fn expect_connected(&mut self) -> Result<usize> {
        loop {
            if let ServerEvent::Connected(session) = self.next_event().await? {
                return Ok(session);
            }
        }
    }

    /// Wait for the next text frame and return it parsed
    pub async fn expect_frame(&mut self) -> Result<serde_json::Value> {
        loop {
            if let ServerEvent::Frame { text, .. } = self.next_event().await? {
                return serde_json::from_str(&text).context("client sent invalid JSON");
            }
        }
    }

    /// Wait for the next session close
    pub async fn expect_closed(&mut self) -> Result<(Option<u16>, String)> {
        loop {
            if let ServerEvent::Closed { code, reason, .. } = self.next_event().await? {
                return Ok((code, reason));
            }
        }
    }

    /// Push a raw text frame to one session
    pub fn send_text(&self, session: usize, text: impl Into<String>) -> bool {
        self.command(session, SessionCommand::Send(text.into()))
    }

    /// Close one session with a close frame
    pub fn close_session(&self, session: usize, code: u16, reason: &str) -> bool {
        self.command(session, SessionCommand::Close(code, reason.to_string()))
    }

    /// Drop one session without a close handshake
    pub fn drop_session(&self, session: usize) -> bool {
        self.command(session, SessionCommand::Drop)
    }

    fn command(&self, session: usize, command: SessionCommand) -> bool {
        self.state
            .sessions
            .lock()
            .get(&session)
            .is_some_and(|tx| tx.send(command).is_ok())
    }
}

async fn websock_handler(
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: ServerState, socket: WebSocket) {
    let session = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.sessions.lock().insert(session, tx);
    state.emit(ServerEvent::Connected(session));

    let (mut ws_sink, mut ws_stream) = socket.split();

    let (code, reason) = loop {
        tokio::select! {
            incoming = ws_stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if state.relay_public && is_public(&text) {
                        state.broadcast(&text);
                    }
                    state.emit(ServerEvent::Frame { session, text });
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = ws_sink.close().await;
                    break match frame {
                        Some(frame) => (Some(frame.code), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break (None, "connection lost".to_string()),
            },
            command = rx.recv() => match command {
                Some(SessionCommand::Send(text)) => {
                    if ws_sink.send(Message::Text(text)).await.is_err() {
                        break (None, "send failed".to_string());
                    }
                }
                Some(SessionCommand::Close(code, reason)) => {
                    let frame = CloseFrame { code, reason: Cow::Owned(reason) };
                    let _ = ws_sink.send(Message::Close(Some(frame))).await;
                }
                Some(SessionCommand::Drop) | None => break (None, "dropped by server".to_string()),
            },
        }
    };

    state.sessions.lock().remove(&session);
    state.emit(ServerEvent::Closed {
        session,
        code,
        reason,
    });
}

fn is_public(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .is_ok_and(|value| value["type"] == "PUBLIC")
}

/// Forward every decoded inbound message of `client` into a channel
pub fn collect_messages(client: &ChatClient) -> mpsc::UnboundedReceiver<ChatMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.subscribe(move |message: &ChatMessage| {
        let _ = tx.send(message.clone());
    });
    rx
}

/// Wait for the next collected message
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<ChatMessage>) -> Result<ChatMessage> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for inbound message")?
        .context("subscription ended")
}

/// Connect `client` and wait for the transport to open
pub async fn connect(client: &ChatClient) -> Result<()> {
    client.connect();
    tokio::time::timeout(WAIT, client.wait_until_connected())
        .await
        .context("timed out connecting")??;
    Ok(())
}
