//! Intrusive fields embedded in pooled objects.
//!
//! Pooled values live directly on the shard lists: the pool threads them
//! together through a `next` pointer stored inside the object itself, so no
//! wrapper node is allocated per put.

use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicPtr, Ordering};

/// The two intrusive fields every pooled type embeds.
///
/// Compose it into your type and hand it back from [`Poolable::node`]:
///
/// ```
/// use shardpool::{PoolNode, Poolable};
///
/// struct Frame {
///     payload: Vec<u8>,
///     node: PoolNode<Frame>,
/// }
///
/// impl Poolable for Frame {
///     fn node(&self) -> &PoolNode<Frame> {
///         &self.node
///     }
/// }
/// ```
///
/// `usage_count` is incremented on every successful checkout and reset by the
/// eviction engine when an object survives a cleanup pass. `next` is only
/// meaningful while the object sits on a shard list; checked-out objects have
/// a null `next`.
pub struct PoolNode<T> {
    usage_count: AtomicI64,
    next: AtomicPtr<T>,
}

impl<T> PoolNode<T> {
    /// New node with a zero usage count and no successor.
    pub const fn new() -> Self {
        Self {
            usage_count: AtomicI64::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Number of checkouts since the last reset.
    #[inline]
    pub fn load_usage(&self) -> i64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    /// Record one checkout.
    #[inline]
    pub fn increment_usage(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Restart the usage window at zero.
    #[inline]
    pub fn reset_usage(&self) {
        self.usage_count.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn load_next(&self) -> *mut T {
        self.next.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn store_next(&self, next: *mut T) {
        self.next.store(next, Ordering::Release)
    }
}

impl<T> Default for PoolNode<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Implemented by types that can be stored in a [`ShardedPool`](crate::ShardedPool).
///
/// The returned [`PoolNode`] must live inside `self` and must be the same
/// node for the whole life of the object.
pub trait Poolable: Sized {
    /// Access the intrusive fields embedded in `self`.
    fn node(&self) -> &PoolNode<Self>;
}
