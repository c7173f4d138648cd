//! Connection lifecycle
//!
//! The state machine, close codes, lifecycle events and the manager that
//! drives a single transport through them.

mod close_codes;
mod events;
mod manager;
mod state;

pub use close_codes::CloseCode;
pub use events::ConnectionEvent;
pub use manager::{ConnectionManager, FrameHandler};
pub use state::{ConnectionState, InvalidTransition};
