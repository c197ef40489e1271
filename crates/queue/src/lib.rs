//! Bounded multi-producer multi-consumer work queue.
//!
//! The queue connecting payload producers to dispatch sessions. Neither
//! operation blocks: a full queue hands the pushed item back to the caller
//! and an empty queue yields `None`. Waiters implement polling with a
//! bounded sleep in their own loops, keeping the queue itself free of
//! synchronization primitives beyond the lock-free ring.

use crossbeam_queue::ArrayQueue;

/// Fixed-capacity queue of owned work items.
///
/// Ordering is not guaranteed across producers; within the queue items come
/// out roughly first-in first-out.
pub struct WorkQueue<T> {
    inner: ArrayQueue<T>,
}

impl<T> WorkQueue<T> {
    /// Creates a queue holding at most `capacity` items (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Attempts to enqueue an item.
    ///
    /// On a full queue the item is returned to the caller — ownership is
    /// never lost and the caller may re-offer the same item later.
    pub fn push(&self, item: T) -> Result<(), T> {
        self.inner.push(item)
    }

    /// Dequeues the next item, or `None` when the queue is empty.
    pub fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
