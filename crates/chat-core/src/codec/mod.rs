//! Message codec
//!
//! Converts between [`Message`](crate::Message) values and JSON text frames.

mod codec;
mod error;

pub use codec::{Codec, PublicPayloadFormat};
pub use error::DecodeError;
