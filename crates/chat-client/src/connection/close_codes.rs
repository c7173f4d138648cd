//! WebSocket close codes
//!
//! Close codes the client sends, and the ones it knows how to interpret when
//! the server closes the connection.

/// WebSocket close codes understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure, the purpose of the connection was fulfilled
    Normal = 1000,
    /// Endpoint is going away (server shutdown, page navigation)
    GoingAway = 1001,
    /// Endpoint received a frame it could not handle
    ProtocolError = 1002,
    /// Connection dropped without a close frame (never sent on the wire)
    Abnormal = 1006,
    /// Server hit an unexpected condition
    InternalError = 1011,
    /// Client gave up waiting for any traffic from the server
    KeepaliveTimeout = 4000,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::ProtocolError),
            1006 => Some(Self::Abnormal),
            1011 => Some(Self::InternalError),
            4000 => Some(Self::KeepaliveTimeout),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get a human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Normal closure",
            Self::GoingAway => "Endpoint going away",
            Self::ProtocolError => "Protocol error",
            Self::Abnormal => "Connection lost without close frame",
            Self::InternalError => "Server internal error",
            Self::KeepaliveTimeout => "Keepalive timeout",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}
