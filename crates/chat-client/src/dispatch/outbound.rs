//! Bounded FIFO of sends made before the transport opened

use crate::error::QueueFull;
use chat_core::Message;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// A buffered send waiting for the transport to open
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    pub message: Message,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingSend {
    fn new(message: Message) -> Self {
        Self {
            message,
            enqueued_at: Utc::now(),
        }
    }
}

/// Bounded FIFO that drops its oldest entry on overflow
#[derive(Debug)]
pub struct OutboundBuffer {
    entries: VecDeque<PendingSend>,
    capacity: usize,
}

impl OutboundBuffer {
    /// Create a buffer holding at most `capacity` sends (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a send
    ///
    /// On overflow the oldest entry is dropped and reported; `message` is
    /// always kept.
    pub fn push(&mut self, message: Message) -> Result<(), QueueFull> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };

        self.entries.push_back(PendingSend::new(message));

        match evicted {
            Some(dropped) => Err(QueueFull {
                capacity: self.capacity,
                evicted: dropped.message.message_type(),
            }),
            None => Ok(()),
        }
    }

    /// Remove and return every entry in enqueue order
    pub fn drain(&mut self) -> Vec<PendingSend> {
        self.entries.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
