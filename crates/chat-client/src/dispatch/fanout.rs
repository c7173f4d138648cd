//! Inbound subscriber registry

use chat_core::Message;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked for every decoded inbound message
pub type InboundCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Opaque token identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Ordered list of subscribers with panic-isolated delivery
pub struct Fanout {
    subscribers: RwLock<Vec<(SubscriptionHandle, InboundCallback)>>,
    next_id: AtomicU64,
}

impl Fanout {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback, delivered after every existing subscriber
    pub fn subscribe(&self, callback: InboundCallback) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((handle, callback));
        handle
    }

    /// Remove a subscription, returning false if it was not registered
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(h, _)| *h != handle);
        subscribers.len() != before
    }

    /// Deliver `message` to every subscriber registered when delivery starts
    ///
    /// Callbacks run without the registry lock held, so they may subscribe or
    /// unsubscribe; such changes apply from the next message. A panicking
    /// callback is logged and skipped. Returns the number of callbacks that
    /// completed normally.
    pub fn publish(&self, message: &Message) -> usize {
        let snapshot: Vec<_> = self.subscribers.read().clone();

        let mut delivered = 0;
        for (handle, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let cause = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        subscription = handle.id(),
                        message_type = %message.message_type(),
                        cause = %cause,
                        "Subscriber panicked, continuing delivery"
                    );
                }
            }
        }
        delivered
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("subscribers", &self.len())
            .finish()
    }
}
