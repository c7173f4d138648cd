//! Outbound buffering and inbound fan-out

mod fanout;
mod outbound;
mod queue;

pub use fanout::{Fanout, InboundCallback, SubscriptionHandle};
pub use outbound::{OutboundBuffer, PendingSend};
pub use queue::DispatchQueue;
