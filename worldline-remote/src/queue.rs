//! Outbound message queue for the push channel.
//!
//! Sends issued while the connection is down are held here in order and
//! flushed oldest-first once it opens. The queue is bounded: when full the
//! oldest message is dropped to make room, since a stale subscription or
//! ping is worth less than the newest one.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::OutboundMessage;

/// Thread-safe FIFO of outbound messages. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    inner: Arc<Mutex<OutboundQueueInner>>,
}

#[derive(Debug)]
struct OutboundQueueInner {
    items: VecDeque<OutboundMessage>,
    max_queue_size: usize,
    total_enqueued: u64,
    total_dropped: u64,
    total_flushed: u64,
}

/// Statistics about the outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Current queue depth.
    pub depth: usize,
    /// Total messages enqueued.
    pub total_enqueued: u64,
    /// Total messages dropped because the queue was full.
    pub total_dropped: u64,
    /// Total messages handed out by [`OutboundQueue::drain`].
    pub total_flushed: u64,
}

impl OutboundQueue {
    /// Create a queue holding at most `max_queue_size` messages (minimum 1).
    #[must_use]
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutboundQueueInner {
                items: VecDeque::new(),
                max_queue_size: max_queue_size.max(1),
                total_enqueued: 0,
                total_dropped: 0,
                total_flushed: 0,
            })),
        }
    }

    /// Append a message. Returns `true` if an older message was dropped.
    pub fn enqueue(&self, message: OutboundMessage) -> bool {
        let mut inner = self.inner.lock();
        let dropped = if inner.items.len() >= inner.max_queue_size {
            inner.items.pop_front();
            inner.total_dropped += 1;
            true
        } else {
            false
        };
        inner.items.push_back(message);
        inner.total_enqueued += 1;
        dropped
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<OutboundMessage> {
        let mut inner = self.inner.lock();
        let out: Vec<_> = inner.items.drain(..).collect();
        inner.total_flushed += out.len() as u64;
        out
    }

    /// Put messages that could not be written back at the front, keeping order.
    pub fn requeue_front(&self, messages: Vec<OutboundMessage>) {
        let mut inner = self.inner.lock();
        inner.total_flushed = inner.total_flushed.saturating_sub(messages.len() as u64);
        for message in messages.into_iter().rev() {
            inner.items.push_front(message);
        }
        while inner.items.len() > inner.max_queue_size {
            inner.items.pop_front();
            inner.total_dropped += 1;
        }
    }

    /// Current queue depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Get queue statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            depth: inner.items.len(),
            total_enqueued: inner.total_enqueued,
            total_dropped: inner.total_dropped,
            total_flushed: inner.total_flushed,
        }
    }
}
