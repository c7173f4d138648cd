//! Wire payload definitions
//!
//! Per-type payload shapes as they appear under the envelope's `payload` key.

use serde::Deserialize;
use serde_json::Value;

/// Outer wire envelope: `{"type": ..., "payload": ...}`
///
/// `kind` stays a raw string here so an unrecognized type can be reported by
/// name instead of failing as a generic parse error.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub payload: Value,
}

/// Payload for PUBLIC in object form
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PublicPayload {
    pub text: String,
}

/// Payload for PRIVATE
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PrivatePayload {
    pub text: String,
    pub to: String,
}

/// Payload for PING (always empty, extra keys are ignored)
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PingPayload {}

/// Payload for QUIT
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct QuitPayload {
    #[serde(default)]
    pub reason: Option<String>,
}
