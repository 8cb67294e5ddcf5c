//! Bounded, insertion-ordered stream buffers.
//!
//! Every append-only collection in the world model (feed, events, logs,
//! interventions, diagnostics) is a [`BoundedBuffer`]. Appending past the
//! capacity drops exactly enough items from the front to get back to the
//! capacity, so eviction is strict FIFO:
//!
//! ```text
//!  push(n+1) ─▶ [ #1 | #2 | ... | #n ] ─▶ [ #2 | ... | #n | #n+1 ]
//!                  ▲ evicted
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::StreamItem;

/// A FIFO buffer that never holds more than `capacity` items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append `item`, evicting from the front if the capacity is exceeded.
    ///
    /// Returns the number of items evicted (0 or 1).
    pub fn push(&mut self, item: T) -> usize {
        self.items.push_back(item);
        self.enforce_capacity()
    }

    /// Replace the contents with `items`, keeping only the newest `capacity`.
    pub fn replace_with(&mut self, items: impl IntoIterator<Item = T>) {
        self.items = items.into_iter().collect();
        self.enforce_capacity();
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn enforce_capacity(&mut self) -> usize {
        let excess = self.items.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.items.drain(..excess);
        }
        excess
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest-first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The most recently appended item.
    #[must_use]
    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    /// The oldest retained item.
    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }
}

impl<T: StreamItem> BoundedBuffer<T> {
    /// Drop every item whose tick is after `tick`.
    pub fn retain_up_to(&mut self, tick: u64) {
        self.items.retain(|item| item.tick() <= tick);
    }

    /// Whether an item with this id is currently buffered.
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }
}

impl<'a, T> IntoIterator for &'a BoundedBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
