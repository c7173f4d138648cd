//! Test fixtures and frame builders
//!
//! Raw wire frames as a server would send them.

use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A user name no other test uses
pub fn unique_user() -> String {
    format!("user{}", unique_suffix())
}

/// PUBLIC frame with an object payload
pub fn public_frame(text: &str) -> String {
    json!({ "type": "PUBLIC", "payload": { "text": text } }).to_string()
}

/// PRIVATE frame
pub fn private_frame(text: &str, to: &str) -> String {
    json!({ "type": "PRIVATE", "payload": { "text": text, "to": to } }).to_string()
}

/// PING frame
pub fn ping_frame() -> String {
    json!({ "type": "PING", "payload": {} }).to_string()
}
