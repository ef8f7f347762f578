//! Thread-safe FIFO Queue
//!
//! Carries outbound messages from producers to the worker thread and inbound
//! events from the worker thread to the consumer.
//!
//! Every operation takes the same lock, so push/pop/clear/len are each atomic
//! with respect to one another and per-thread push order is preserved.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// A thread-safe queue of owned items
pub struct Queue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Queue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an item at the back
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Remove and return the oldest item
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Discard every item, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let count = items.len();
        items.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
