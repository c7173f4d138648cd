//! Connection manager
//!
//! Owns the single logical connection: the state machine, the transport
//! writer, the keepalive task and the reconnect timer. All state lives behind
//! one mutex so a state change and the flush of buffered sends happen in the
//! same critical section. Background tasks hold a `Weak` reference plus the
//! connection generation they were started for, and drop out when either is
//! stale.

use super::{CloseCode, ConnectionEvent, ConnectionState};
use crate::dispatch::DispatchQueue;
use crate::error::SendError;
use crate::keepalive::KeepaliveSupervisor;
use crate::transport::{Connector, OutboundFrame, TransportEvent, TransportHandle};
use chat_common::ClientConfig;
use chat_core::{Codec, Message, MessageType};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Receives every raw inbound text frame, in arrival order
pub type FrameHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Capacity of the lifecycle event channel
const EVENT_BUFFER_SIZE: usize = 64;

/// Drives one logical connection to the chat server
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

struct Shared {
    config: ClientConfig,
    codec: Codec,
    connector: Arc<dyn Connector>,
    dispatch: Arc<DispatchQueue>,
    on_frame: FrameHandler,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ConnectionEvent>,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    /// Bumped on every connect attempt
    generation: u64,
    writer: Option<mpsc::UnboundedSender<OutboundFrame>>,
    keepalive: KeepaliveSupervisor,
    connection_task: Option<JoinHandle<()>>,
    close_timer: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Consecutive reconnect attempts since the last successful open
    reconnect_attempt: u32,
    /// Set by a user close; the resulting disconnect never auto-reconnects
    reconnect_suppressed: bool,
    last_inbound_at: Option<Instant>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in [
            self.connection_task.take(),
            self.close_timer.take(),
            self.reconnect_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

impl ConnectionManager {
    /// Create a manager in the `Idle` state
    ///
    /// `on_frame` receives every inbound text frame; sends made before the
    /// transport opens are buffered in `dispatch`.
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        dispatch: Arc<DispatchQueue>,
        on_frame: FrameHandler,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);

        Self {
            shared: Arc::new(Shared {
                codec: Codec::new(config.public_format),
                config: config.clone(),
                connector,
                dispatch,
                on_frame,
                inner: Mutex::new(Inner::default()),
                state_tx,
                events_tx,
            }),
        }
    }

    /// Start opening the transport
    ///
    /// No-op unless the state is `Idle` or `Disconnected`. Returns
    /// immediately; watch [`Self::subscribe_state`] or [`Self::events`] for
    /// the outcome. Must be called from within a tokio runtime.
    pub fn connect(&self) {
        self.shared.connect();
    }

    /// Send a message, or buffer it until the transport opens
    ///
    /// # Errors
    /// - [`SendError::UnsupportedType`] if the server does not accept the type
    /// - [`SendError::NotConnected`] while closing, or when disconnected with
    ///   buffering off
    /// - [`SendError::QueueFull`] if buffering dropped the oldest pending send
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        self.shared.send(message)
    }

    /// Begin a normal close
    ///
    /// From `Connected` this sends a close frame and waits up to the close
    /// timeout for the transport to confirm. From `Connecting` the attempt is
    /// cancelled. A pending automatic reconnect is cancelled. A disconnect
    /// caused by this call never triggers an automatic reconnect.
    pub fn close(&self, reason: &str) {
        self.shared.close_with(CloseCode::Normal, reason, true);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Receive lifecycle events raised after this call
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Number of connect attempts started so far
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.inner.lock().generation
    }

    #[must_use]
    pub fn is_keepalive_running(&self) -> bool {
        self.shared.inner.lock().keepalive.is_running()
    }

    /// Check if an automatic reconnect is waiting to fire
    #[must_use]
    pub fn is_reconnect_pending(&self) -> bool {
        self.shared
            .inner
            .lock()
            .reconnect_timer
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.config.server_url
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.config.server_url)
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("reconnect_attempt", &inner.reconnect_attempt)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn connect(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Idle | ConnectionState::Disconnected => {}
            ConnectionState::Closing => {
                tracing::warn!("Connect ignored while closing");
                return;
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                tracing::debug!(state = %inner.state, "Connect ignored");
                return;
            }
        }

        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        self.start_connecting(&mut inner);
    }

    fn start_connecting(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(task) = inner.connection_task.take() {
            task.abort();
        }

        inner.generation += 1;
        inner.reconnect_suppressed = false;
        inner.last_inbound_at = None;
        self.transition(inner, ConnectionState::Connecting);

        let generation = inner.generation;
        tracing::info!(url = %self.config.server_url, generation, "Connecting");

        inner.connection_task = Some(tokio::spawn(run_connection(
            Arc::downgrade(self),
            Arc::clone(&self.connector),
            self.config.server_url.clone(),
            generation,
        )));
    }

    fn send(&self, message: Message) -> Result<(), SendError> {
        let kind = message.message_type();
        if !self.config.supports(kind) {
            return Err(SendError::UnsupportedType(kind));
        }

        let inner = self.inner.lock();
        match inner.state {
            ConnectionState::Connected => self.write_message(&inner, &message),
            ConnectionState::Idle | ConnectionState::Connecting => self.buffer(message),
            ConnectionState::Disconnected if self.buffers_while_disconnected() => {
                self.buffer(message)
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                Err(SendError::NotConnected)
            }
        }
    }

    fn buffers_while_disconnected(&self) -> bool {
        self.config.queue.buffer_when_disconnected || self.config.auto_reconnect.enabled
    }

    /// Caller holds the state lock, so a concurrent open cannot flush first
    fn buffer(&self, message: Message) -> Result<(), SendError> {
        let kind = message.message_type();
        self.dispatch.enqueue_outbound(message).map_err(|full| {
            tracing::warn!(
                capacity = full.capacity,
                evicted = %full.evicted,
                "Outbound queue full, dropped oldest message"
            );
            SendError::from(full)
        })?;
        tracing::trace!(message_type = %kind, "Send buffered");
        Ok(())
    }

    fn write_message(&self, inner: &Inner, message: &Message) -> Result<(), SendError> {
        let writer = inner.writer.as_ref().ok_or(SendError::NotConnected)?;
        writer
            .send(OutboundFrame::Text(self.codec.encode(message)))
            .map_err(|_| SendError::NotConnected)
    }

    fn close_with(self: &Arc<Self>, code: CloseCode, reason: &str, user_initiated: bool) {
        let mut inner = self.inner.lock();
        self.begin_close(&mut inner, code, reason, user_initiated);
    }

    fn begin_close(
        self: &Arc<Self>,
        inner: &mut Inner,
        code: CloseCode,
        reason: &str,
        user_initiated: bool,
    ) {
        match inner.state {
            ConnectionState::Connected => {
                inner.keepalive.stop();
                inner.reconnect_suppressed = user_initiated;
                self.transition(inner, ConnectionState::Closing);

                if let Some(writer) = &inner.writer {
                    let _ = writer.send(OutboundFrame::Close {
                        code,
                        reason: reason.to_string(),
                    });
                }

                let deadline = Instant::now() + self.config.close_timeout;
                let weak = Arc::downgrade(self);
                let generation = inner.generation;
                inner.close_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    if let Some(shared) = weak.upgrade() {
                        shared.close_timed_out(generation);
                    }
                }));

                tracing::info!(code = code.as_u16(), reason = %reason, "Closing connection");
            }
            ConnectionState::Connecting => {
                if let Some(task) = inner.connection_task.take() {
                    task.abort();
                }
                inner.reconnect_suppressed = user_initiated;
                self.settle_disconnected(inner, Some(code.as_u16()), reason.to_string());
            }
            ConnectionState::Disconnected if user_initiated => {
                if let Some(timer) = inner.reconnect_timer.take() {
                    timer.abort();
                    tracing::debug!("Pending reconnect cancelled");
                }
            }
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Closing => {
                tracing::debug!(state = %inner.state, "Close ignored");
            }
        }
    }

    fn close_timed_out(self: &Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Closing {
            return;
        }

        tracing::warn!(
            timeout_ms = self.config.close_timeout.as_millis(),
            "Close handshake timed out, forcing disconnect"
        );

        // Running inside this timer; drop the handle without aborting
        inner.close_timer = None;
        if let Some(task) = inner.connection_task.take() {
            task.abort();
        }

        let code = Some(CloseCode::Abnormal.as_u16());
        self.settle_disconnected(&mut inner, code, "close timed out".to_string());
        self.maybe_reconnect(&mut inner);
    }

    fn handle_open(
        self: &Arc<Self>,
        generation: u64,
        writer: mpsc::UnboundedSender<OutboundFrame>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            tracing::debug!(generation, "Ignoring open of stale connection attempt");
            return false;
        }

        self.transition(&mut inner, ConnectionState::Connected);
        inner.writer = Some(writer);
        inner.reconnect_attempt = 0;
        inner.last_inbound_at = Some(Instant::now());

        // Still under the lock: nothing sent after this point can overtake
        let pending = self.dispatch.flush_outbound();
        let flushed = pending.len();
        for entry in pending {
            if let Err(e) = self.write_message(&inner, &entry.message) {
                tracing::warn!(error = %e, "Failed to flush buffered send");
                break;
            }
        }

        if self.config.supports(MessageType::Ping) {
            let weak = Arc::downgrade(self);
            inner.keepalive.start(self.config.keepalive.interval, move || {
                weak.upgrade()
                    .is_some_and(|shared| shared.keepalive_tick(generation))
            });
        } else {
            tracing::debug!("Server does not accept PING, keepalive disabled");
        }

        tracing::info!(url = %self.config.server_url, generation, flushed, "Connected");
        self.emit(ConnectionEvent::Opened);
        true
    }

    fn keepalive_tick(self: &Arc<Self>, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connected {
            return false;
        }

        if self.config.keepalive.liveness_timeout {
            let limit = self.config.keepalive.interval * 2;
            let silent_for = inner
                .last_inbound_at
                .map_or(Duration::ZERO, |at| at.elapsed());
            if silent_for >= limit {
                tracing::warn!(
                    silent_ms = silent_for.as_millis(),
                    limit_ms = limit.as_millis(),
                    "No inbound traffic, closing connection"
                );
                self.begin_close(&mut inner, CloseCode::KeepaliveTimeout, "timeout", false);
                return false;
            }
        }

        match self.write_message(&inner, &Message::ping()) {
            Ok(()) => {
                tracing::trace!(generation, "Keepalive PING sent");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Keepalive PING not written");
                false
            }
        }
    }

    fn handle_frame(&self, generation: u64, frame: &str) {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation
                || !matches!(
                    inner.state,
                    ConnectionState::Connected | ConnectionState::Closing
                )
            {
                return;
            }
            inner.last_inbound_at = Some(Instant::now());
        }

        // Outside the lock: subscribers may call back into the manager
        (self.on_frame)(frame);
    }

    fn handle_transport_closed(
        self: &Arc<Self>,
        generation: u64,
        code: Option<u16>,
        reason: String,
    ) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || !inner.state.is_active() {
            tracing::trace!(generation, "Ignoring close of stale transport");
            return;
        }

        // The connection task is the caller and is about to finish
        inner.connection_task = None;
        self.settle_disconnected(&mut inner, code, reason);
        self.maybe_reconnect(&mut inner);
    }

    fn settle_disconnected(&self, inner: &mut Inner, code: Option<u16>, reason: String) {
        inner.keepalive.stop();
        inner.writer = None;
        if let Some(timer) = inner.close_timer.take() {
            timer.abort();
        }

        self.transition(inner, ConnectionState::Disconnected);
        tracing::info!(code = ?code, reason = %reason, "Disconnected");
        self.emit(ConnectionEvent::Closed { code, reason });
    }

    fn maybe_reconnect(self: &Arc<Self>, inner: &mut Inner) {
        let policy = self.config.auto_reconnect;
        if !policy.enabled || inner.reconnect_suppressed {
            return;
        }

        let attempt = inner.reconnect_attempt;
        inner.reconnect_attempt = attempt.saturating_add(1);
        let delay = with_jitter(policy.delay_for(attempt));

        let deadline = Instant::now() + delay;
        let weak = Arc::downgrade(self);
        let generation = inner.generation;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(shared) = weak.upgrade() {
                shared.reconnect_due(generation);
            }
        });
        if let Some(previous) = inner.reconnect_timer.replace(timer) {
            previous.abort();
        }

        let attempt = attempt.saturating_add(1);
        tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnect scheduled");
        self.emit(ConnectionEvent::ReconnectScheduled { attempt, delay });
    }

    fn reconnect_due(self: &Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            // A newer timer may own the slot
            return;
        }
        // Running inside the timer; drop the handle without aborting
        inner.reconnect_timer = None;
        if inner.state != ConnectionState::Disconnected {
            return;
        }
        self.start_connecting(&mut inner);
    }

    /// # Panics
    /// Panics on a transition the state machine does not define. Every caller
    /// checks the current state first, so this only fires on a logic error.
    fn transition(&self, inner: &mut Inner, next: ConnectionState) {
        let from = inner.state;
        match from.transition(next) {
            Ok(state) => {
                inner.state = state;
                self.state_tx.send_replace(state);
                tracing::debug!(from = %from, to = %state, generation = inner.generation, "State changed");
            }
            Err(e) => panic!("{e}"),
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }
}

/// Add up to 10% random jitter to a backoff delay
fn with_jitter(base: Duration) -> Duration {
    let spread = u64::try_from(base.as_millis() / 10).unwrap_or(u64::MAX);
    if spread == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

/// One connection attempt: open the transport, then pump its events
async fn run_connection(
    shared: Weak<Shared>,
    connector: Arc<dyn Connector>,
    url: String,
    generation: u64,
) {
    let result = connector.connect(&url).await;

    let Some(strong) = shared.upgrade() else {
        return;
    };
    let TransportHandle {
        outbound,
        mut inbound,
    } = match result {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Connection attempt failed");
            strong.handle_transport_closed(generation, None, e.to_string());
            return;
        }
    };

    if !strong.handle_open(generation, outbound) {
        return;
    }
    drop(strong);

    while let Some(event) = inbound.recv().await {
        let Some(strong) = shared.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Frame(text) => strong.handle_frame(generation, &text),
            TransportEvent::Closed { code, reason } => {
                strong.handle_transport_closed(generation, code, reason);
                return;
            }
            TransportEvent::Error(e) => {
                tracing::warn!(error = %e, "Transport error");
                strong.handle_transport_closed(
                    generation,
                    Some(CloseCode::Abnormal.as_u16()),
                    e.to_string(),
                );
                return;
            }
        }
    }

    // Transport vanished without a terminal event
    if let Some(strong) = shared.upgrade() {
        strong.handle_transport_closed(generation, None, "transport ended".to_string());
    }
}
