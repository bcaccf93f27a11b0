//! Non-intrusive alternative pool.
//!
//! For callers that do not want to embed [`PoolNode`](crate::PoolNode)
//! fields in their types: a bounded lock-free queue of whole objects. No
//! sharding, no usage-driven eviction, no blocking variant; excess returns
//! are simply dropped.

use crossbeam::queue::ArrayQueue;

use crate::config::{Allocator, Cleaner};

/// Lock-free pool of reusable objects behind a bounded queue.
pub struct SimplePool<T> {
    slots: ArrayQueue<T>,
    allocator: Allocator<T>,
    cleaner: Cleaner<T>,
}

impl<T> SimplePool<T> {
    /// Create a pool that retains at most `capacity` idle objects.
    pub fn new(
        capacity: usize,
        allocator: impl Fn() -> T + Send + Sync + 'static,
        cleaner: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            slots: ArrayQueue::new(capacity),
            allocator: Box::new(allocator),
            cleaner: Box::new(cleaner),
        }
    }

    /// Take a recycled object, or allocate a fresh one on a miss.
    #[inline]
    pub fn get(&self) -> T {
        self.slots.pop().unwrap_or_else(|| (self.allocator)())
    }

    /// Clean `obj` and shelve it for reuse.
    ///
    /// The object is dropped when the pool is already at capacity.
    #[inline]
    pub fn put(&self, mut obj: T) {
        (self.cleaner)(&mut obj);
        let _ = self.slots.push(obj);
    }

    /// Number of idle objects currently shelved.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no idle objects are shelved.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
