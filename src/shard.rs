//! Lock-free LIFO shard.
//!
//! Each shard is an intrusive Treiber stack of idle objects threaded through
//! their embedded `next` pointers. Get/put touch only the atomic head; the
//! mutex and condvar exist solely for the blocking variant.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam::epoch::Guard;
use parking_lot::{Condvar, Mutex};

use crate::node::Poolable;

/// One lock-free stack of free objects.
///
/// Shards are stored cache-line padded so adjacent shards never share a line.
pub(crate) struct Shard<T> {
    head: AtomicPtr<T>,
    /// Held only by blocked getters and the producer that wakes them.
    pub(crate) waiter_lock: Mutex<()>,
    pub(crate) available: Condvar,
}

impl<T: Poolable> Shard<T> {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            waiter_lock: Mutex::new(()),
            available: Condvar::new(),
        }
    }

    /// Publish `obj` as the new head.
    ///
    /// `next` is written before the CAS: until the CAS succeeds no other
    /// thread can observe `obj` through `head`, so the link is never seen
    /// half-initialized.
    pub(crate) fn push(&self, obj: NonNull<T>) {
        // Safety: the caller owns `obj` exclusively until the CAS publishes it.
        let node = unsafe { obj.as_ref() }.node();
        loop {
            let old = self.head.load(Ordering::Acquire);
            node.store_next(old);
            if self
                .head
                .compare_exchange_weak(old, obj.as_ptr(), Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Pop the current head, or `None` when the shard is empty. Never blocks.
    ///
    /// The popped object's `next` is left untouched; the caller clears it
    /// before the object is re-published. A popped object is held by its
    /// caller until the matching put, so its address cannot be re-pushed
    /// while still visible as `head` to a racing pop.
    pub(crate) fn pop(&self, _guard: &Guard) -> Option<NonNull<T>> {
        loop {
            let old = self.head.load(Ordering::Acquire);
            let head = NonNull::new(old)?;
            // Safety: the pinned epoch keeps the node alive across this read
            // even if the eviction engine detaches and frees it concurrently.
            let next = unsafe { head.as_ref() }.node().load_next();
            if self
                .head
                .compare_exchange_weak(old, next, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Some(head);
            }
        }
    }

    /// Single-attempt detach of the entire list.
    ///
    /// Returns `None` when the shard is empty or the CAS loses a race; the
    /// eviction engine simply retries on the next tick.
    pub(crate) fn try_detach(&self) -> Option<NonNull<T>> {
        let old = self.head.load(Ordering::Acquire);
        let head = NonNull::new(old)?;
        self.head
            .compare_exchange(old, ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
            .ok()?;
        Some(head)
    }

    /// Detach the entire list, retrying through contention.
    ///
    /// `None` only when the shard is empty. Used by the close-time drain.
    pub(crate) fn detach(&self) -> Option<NonNull<T>> {
        loop {
            let old = self.head.load(Ordering::Acquire);
            let head = NonNull::new(old)?;
            if self
                .head
                .compare_exchange(old, ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(head);
            }
        }
    }

    /// Atomically prepend an owned `kept_head..=kept_tail` chain.
    ///
    /// Concurrent puts may have installed a new list since the detach; the
    /// loop merges them by pointing `kept_tail` at whatever head exists.
    pub(crate) fn prepend(&self, kept_head: NonNull<T>, kept_tail: NonNull<T>) {
        // Safety: the chain is private to the caller until the CAS below.
        let tail_node = unsafe { kept_tail.as_ref() }.node();
        loop {
            let curr = self.head.load(Ordering::Acquire);
            tail_node.store_next(curr);
            if self
                .head
                .compare_exchange_weak(curr, kept_head.as_ptr(), Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PoolNode;
    use crossbeam::epoch;

    struct Item {
        id: usize,
        node: PoolNode<Item>,
    }

    impl Poolable for Item {
        fn node(&self) -> &PoolNode<Item> {
            &self.node
        }
    }

    fn boxed(id: usize) -> NonNull<Item> {
        NonNull::from(Box::leak(Box::new(Item {
            id,
            node: PoolNode::new(),
        })))
    }

    fn reclaim(obj: NonNull<Item>) -> usize {
        // Safety: tests pop every pushed item before reclaiming it.
        let item = unsafe { Box::from_raw(obj.as_ptr()) };
        item.id
    }

    #[test]
    fn test_push_pop_lifo() {
        let shard = Shard::<Item>::new();
        let guard = epoch::pin();

        shard.push(boxed(1));
        shard.push(boxed(2));
        shard.push(boxed(3));

        assert_eq!(reclaim(shard.pop(&guard).unwrap()), 3);
        assert_eq!(reclaim(shard.pop(&guard).unwrap()), 2);
        assert_eq!(reclaim(shard.pop(&guard).unwrap()), 1);
        assert!(shard.pop(&guard).is_none());
    }

    #[test]
    fn test_pop_empty() {
        let shard = Shard::<Item>::new();
        let guard = epoch::pin();
        assert!(shard.pop(&guard).is_none());
    }

    #[test]
    fn test_detach_takes_whole_list() {
        let shard = Shard::<Item>::new();
        let guard = epoch::pin();

        for id in 0..4 {
            shard.push(boxed(id));
        }

        let mut current = shard.try_detach();
        assert!(shard.pop(&guard).is_none(), "detach must empty the shard");

        let mut seen = 0;
        while let Some(obj) = current {
            // Safety: the detached chain is exclusively ours.
            let next = unsafe { obj.as_ref() }.node().load_next();
            current = NonNull::new(next);
            reclaim(obj);
            seen += 1;
        }
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_prepend_merges_with_new_head() {
        let shard = Shard::<Item>::new();
        let guard = epoch::pin();

        // Build a detached chain 10 -> 11.
        let head = boxed(10);
        let tail = boxed(11);
        unsafe { head.as_ref() }.node().store_next(tail.as_ptr());

        // A concurrent put lands before the reinsert.
        shard.push(boxed(99));
        shard.prepend(head, tail);

        assert_eq!(reclaim(shard.pop(&guard).unwrap()), 10);
        assert_eq!(reclaim(shard.pop(&guard).unwrap()), 11);
        assert_eq!(reclaim(shard.pop(&guard).unwrap()), 99);
        assert!(shard.pop(&guard).is_none());
    }

    #[test]
    fn test_concurrent_push_pop() {
        let shard = Shard::<Item>::new();
        const PER_THREAD: usize = 500;
        const THREADS: usize = 4;

        std::thread::scope(|s| {
            for t in 0..THREADS {
                let shard = &shard;
                s.spawn(move || {
                    let guard = epoch::pin();
                    for i in 0..PER_THREAD {
                        shard.push(boxed(t * PER_THREAD + i));
                        // Immediately cycle one object back through the stack.
                        if let Some(obj) = shard.pop(&guard) {
                            unsafe { obj.as_ref() }.node().store_next(ptr::null_mut());
                            shard.push(obj);
                        }
                    }
                });
            }
        });

        // Every pushed object is still on the list exactly once.
        let guard = epoch::pin();
        let mut ids = rustc_hash::FxHashSet::default();
        while let Some(obj) = shard.pop(&guard) {
            assert!(ids.insert(reclaim(obj)), "object appeared twice on the shard");
        }
        assert_eq!(ids.len(), THREADS * PER_THREAD);
    }
}
