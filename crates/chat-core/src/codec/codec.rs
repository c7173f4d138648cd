//! Envelope encoder/decoder
//!
//! Every frame is a single JSON object `{"type": <TYPE>, "payload": <object>}`.
//! The payload key is always written, `{}` when the message has nothing to
//! carry, so receivers never need to null-check it.

use super::DecodeError;
use crate::protocol::payloads::{
    Envelope, PingPayload, PrivatePayload, PublicPayload, QuitPayload,
};
use crate::protocol::{Message, MessageType};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// How a PUBLIC message's text is laid out under `payload`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicPayloadFormat {
    /// `{"text": "..."}`
    #[default]
    Object,
    /// `"..."`, the layout the browser prototype sent
    BareString,
}

impl std::str::FromStr for PublicPayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "object" => Ok(Self::Object),
            "bare" | "bare_string" | "string" => Ok(Self::BareString),
            other => Err(other.to_string()),
        }
    }
}

/// Message codec
///
/// Stateless apart from the PUBLIC payload layout, which is fixed per codec so
/// a given connection never has to guess which layout a peer used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Codec {
    public_format: PublicPayloadFormat,
}

impl Codec {
    /// Create a codec with the given PUBLIC payload layout
    #[must_use]
    pub const fn new(public_format: PublicPayloadFormat) -> Self {
        Self { public_format }
    }

    /// Get the PUBLIC payload layout
    #[must_use]
    pub const fn public_format(&self) -> PublicPayloadFormat {
        self.public_format
    }

    /// Encode a message into a text frame
    #[must_use]
    pub fn encode(&self, message: &Message) -> String {
        let payload = match message {
            Message::Public { text } => match self.public_format {
                PublicPayloadFormat::Object => json!({ "text": text }),
                PublicPayloadFormat::BareString => Value::String(text.clone()),
            },
            Message::Private { text, to } => json!({ "text": text, "to": to }),
            Message::Ping | Message::Quit { reason: None } => Value::Object(Map::new()),
            Message::Quit {
                reason: Some(reason),
            } => json!({ "reason": reason }),
        };

        json!({
            "type": message.message_type().name(),
            "payload": payload,
        })
        .to_string()
    }

    /// Decode a text frame into a message
    ///
    /// Fails with [`DecodeError::MalformedEnvelope`] when the frame is not an
    /// envelope object or the payload does not fit the type, and with
    /// [`DecodeError::UnknownType`] when the type tag is not recognized.
    pub fn decode(&self, frame: &str) -> Result<Message, DecodeError> {
        let envelope: Envelope = serde_json::from_str(frame)?;

        let kind = MessageType::from_name(&envelope.kind)
            .ok_or_else(|| DecodeError::UnknownType(envelope.kind.clone()))?;

        let payload = match envelope.payload {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        match kind {
            MessageType::Public => self.decode_public(payload),
            MessageType::Private => {
                let PrivatePayload { text, to } = parse_payload(kind, payload)?;
                Ok(Message::Private { text, to })
            }
            MessageType::Ping => {
                let PingPayload {} = parse_payload(kind, payload)?;
                Ok(Message::Ping)
            }
            MessageType::Quit => {
                let QuitPayload { reason } = parse_payload(kind, payload)?;
                Ok(Message::Quit { reason })
            }
        }
    }

    fn decode_public(&self, payload: Value) -> Result<Message, DecodeError> {
        match (self.public_format, payload) {
            (PublicPayloadFormat::BareString, Value::String(text)) => Ok(Message::Public { text }),
            (PublicPayloadFormat::BareString, other) => Err(DecodeError::MalformedEnvelope(
                format!("PUBLIC payload must be a string, got {}", json_kind(&other)),
            )),
            (PublicPayloadFormat::Object, payload) => {
                let PublicPayload { text } = parse_payload(MessageType::Public, payload)?;
                Ok(Message::Public { text })
            }
        }
    }
}

fn parse_payload<T: DeserializeOwned>(kind: MessageType, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload)
        .map_err(|e| DecodeError::MalformedEnvelope(format!("invalid {kind} payload: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
