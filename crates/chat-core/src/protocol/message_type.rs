//! Message type tags
//!
//! Defines the `type` discriminator carried by every wire envelope.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Message type tag
///
/// The set is closed at decode time: an envelope whose `type` is not listed
/// here is rejected rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MessageType {
    /// Text broadcast to every participant
    Public,
    /// Text addressed to a single recipient
    Private,
    /// Liveness signal, no payload
    Ping,
    /// Client is leaving, optional reason
    Quit,
}

impl MessageType {
    /// Every known message type, in wire-definition order
    pub const ALL: [Self; 4] = [Self::Public, Self::Private, Self::Ping, Self::Quit];

    /// Look up a message type by its wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PUBLIC" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            "PING" => Some(Self::Ping),
            "QUIT" => Some(Self::Quit),
            _ => None,
        }
    }

    /// Get the wire name of this message type
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
            Self::Ping => "PING",
            Self::Quit => "QUIT",
        }
    }

    /// Check if messages of this type carry user-visible text
    #[must_use]
    pub const fn carries_text(self) -> bool {
        matches!(self, Self::Public | Self::Private)
    }
}

impl Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown message type: {name}")))
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(&s.trim().to_ascii_uppercase()).ok_or_else(|| s.to_string())
    }
}
