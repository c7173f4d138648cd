//! Dispatch queue
//!
//! Owns the outbound buffer used while the connection is not open and the
//! inbound subscriber list. Safe to share between the connection manager and
//! the client facade.

use super::fanout::{Fanout, InboundCallback, SubscriptionHandle};
use super::outbound::{OutboundBuffer, PendingSend};
use crate::error::QueueFull;
use chat_core::Message;
use parking_lot::Mutex;
use std::sync::Arc;

/// Outbound buffering and inbound fan-out
#[derive(Debug)]
pub struct DispatchQueue {
    outbound: Mutex<OutboundBuffer>,
    fanout: Fanout,
}

impl DispatchQueue {
    /// Create a queue buffering at most `capacity` outbound sends
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            outbound: Mutex::new(OutboundBuffer::new(capacity)),
            fanout: Fanout::new(),
        }
    }

    /// Buffer a send until the transport opens
    ///
    /// # Errors
    /// Returns [`QueueFull`] when the oldest buffered send had to be dropped.
    /// `message` itself is still buffered.
    pub fn enqueue_outbound(&self, message: Message) -> Result<(), QueueFull> {
        self.outbound.lock().push(message)
    }

    /// Take every buffered send in enqueue order
    pub fn flush_outbound(&self) -> Vec<PendingSend> {
        self.outbound.lock().drain()
    }

    /// Deliver an inbound message to all subscribers
    pub fn publish_inbound(&self, message: &Message) -> usize {
        self.fanout.publish(message)
    }

    /// Register an inbound callback
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Register an already shared inbound callback
    pub fn subscribe_arc(&self, callback: InboundCallback) -> SubscriptionHandle {
        self.fanout.subscribe(callback)
    }

    /// Remove an inbound callback
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.fanout.unsubscribe(handle)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.len()
    }

    /// Number of buffered outbound sends
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.outbound.lock().len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.outbound.lock().capacity()
    }
}
