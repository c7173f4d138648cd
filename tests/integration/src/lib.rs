//! Integration test utilities for the chat client
//!
//! This crate provides an in-process WebSocket server and helpers for
//! running the client end to end over real sockets.

pub mod helpers;
pub mod fixtures;

pub use helpers::*;
pub use fixtures::*;
