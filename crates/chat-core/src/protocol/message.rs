//! Chat message model
//!
//! A [`Message`] is the unit of wire communication. Each variant owns exactly
//! the payload its type allows, so an ill-formed message cannot be built.

use super::MessageType;

/// A single chat protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text broadcast to everyone
    Public { text: String },
    /// Text addressed to one recipient
    Private { text: String, to: String },
    /// Keepalive signal
    Ping,
    /// Leaving the chat
    Quit { reason: Option<String> },
}

impl Message {
    /// Create a public message
    pub fn public(text: impl Into<String>) -> Self {
        Self::Public { text: text.into() }
    }

    /// Create a private message for `to`
    pub fn private(text: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Private {
            text: text.into(),
            to: to.into(),
        }
    }

    /// Create a ping message
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping
    }

    /// Create a quit message with an optional reason
    pub fn quit(reason: Option<impl Into<String>>) -> Self {
        Self::Quit {
            reason: reason.map(Into::into),
        }
    }

    /// Get the type tag of this message
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Public { .. } => MessageType::Public,
            Self::Private { .. } => MessageType::Private,
            Self::Ping => MessageType::Ping,
            Self::Quit { .. } => MessageType::Quit,
        }
    }

    /// Get the text body, if this message carries one
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Public { text } | Self::Private { text, .. } => Some(text),
            Self::Ping | Self::Quit { .. } => None,
        }
    }

    /// Check if this is a keepalive ping
    #[inline]
    pub fn is_ping(&self) -> bool {
        matches!(self, Self::Ping)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public { text } => write!(f, "{text}"),
            Self::Private { text, to } => write!(f, "[to {to}] {text}"),
            Self::Ping => write!(f, "PING"),
            Self::Quit { reason: Some(reason) } => write!(f, "QUIT ({reason})"),
            Self::Quit { reason: None } => write!(f, "QUIT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(
            Message::public("hi"),
            Message::Public {
                text: "hi".to_string()
            }
        );
        assert_eq!(
            Message::private("psst", "User2"),
            Message::Private {
                text: "psst".to_string(),
                to: "User2".to_string()
            }
        );
        assert_eq!(Message::quit(None::<String>), Message::Quit { reason: None });
        assert_eq!(
            Message::quit(Some("bye")),
            Message::Quit {
                reason: Some("bye".to_string())
            }
        );
    }

    #[test]
    fn test_message_type() {
        assert_eq!(Message::public("a").message_type(), MessageType::Public);
        assert_eq!(Message::private("a", "b").message_type(), MessageType::Private);
        assert_eq!(Message::ping().message_type(), MessageType::Ping);
        assert_eq!(Message::quit(None::<String>).message_type(), MessageType::Quit);
    }

    #[test]
    fn test_text() {
        assert_eq!(Message::public("hello").text(), Some("hello"));
        assert_eq!(Message::private("secret", "bob").text(), Some("secret"));
        assert_eq!(Message::ping().text(), None);
        assert!(Message::ping().is_ping());
        assert!(!Message::public("x").is_ping());
    }

    #[test]
    fn test_display() {
        assert_eq!(Message::public("hi").to_string(), "hi");
        assert_eq!(Message::private("hi", "User1").to_string(), "[to User1] hi");
        assert_eq!(Message::quit(Some("done")).to_string(), "QUIT (done)");
    }
}
