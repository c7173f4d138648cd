//! Connection lifecycle events

use std::time::Duration;

/// Lifecycle notification raised by the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Transport opened and buffered sends were flushed
    Opened,
    /// Transport closed, failed to open, or was force-closed after a timeout
    Closed {
        /// Close code reported by the peer (or chosen locally)
        code: Option<u16>,
        /// Diagnostic cause
        reason: String,
    },
    /// Automatic reconnect will be attempted after `delay`
    ReconnectScheduled {
        /// 1-based attempt number since the last successful open
        attempt: u32,
        delay: Duration,
    },
}

impl ConnectionEvent {
    /// Check if this event reports a closed connection
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}
