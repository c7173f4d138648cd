//! Connection lifecycle state

use thiserror::Error;

/// Connection state
///
/// Legal transitions:
///
/// ```text
/// Idle ──connect──▶ Connecting ──open──▶ Connected ──close()──▶ Closing
///                      │                    │                     │
///                      └──fail──▶ Disconnected ◀──transport close──┘
///                                     │
///                                     └──connect──▶ Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Created, `connect` never called
    #[default]
    Idle,
    /// Transport open in progress
    Connecting,
    /// Transport open, sends go straight to the wire
    Connected,
    /// Transport closed or failed
    Disconnected,
    /// Close requested, waiting for the transport to confirm
    Closing,
}

/// Attempted a transition the state machine does not define
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid connection state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl ConnectionState {
    /// Check if the state machine allows moving from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Closing | Self::Disconnected)
                | (Self::Closing, Self::Disconnected)
        )
    }

    /// Move to `next`, or report the undefined transition
    pub fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Check if `connect` may start a new attempt from this state
    #[must_use]
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected)
    }

    /// Check if a transport is (or is about to be) attached
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Closing)
    }

    /// Get the name of this state
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Closing => "Closing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
