use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::node::Poolable;
use crate::pool::ShardedPool;

/// A checked-out pool object.
///
/// Dereferences to `T`. Hand it back with [`ShardedPool::put`] or
/// [`ShardedPool::put_block`]; simply dropping it also returns the object to
/// the caller's shard after the cleaner runs. Because the put operations take
/// the handle by value, an object cannot be returned twice.
pub struct Handle<'p, T: Poolable + Send + 'static> {
    obj: NonNull<T>,
    pool: &'p ShardedPool<T>,
}

// A handle confers exclusive access to its object, so moving it across
// threads moves the `T`; sharing it shares `&T`.
unsafe impl<T: Poolable + Send + 'static> Send for Handle<'_, T> {}
unsafe impl<T: Poolable + Send + Sync + 'static> Sync for Handle<'_, T> {}

impl<'p, T: Poolable + Send + 'static> Handle<'p, T> {
    pub(super) fn new(pool: &'p ShardedPool<T>, obj: NonNull<T>) -> Self {
        Self { obj, pool }
    }

    /// Consume the handle without releasing the object; the put paths take
    /// over ownership from here.
    pub(super) fn into_raw(self) -> NonNull<T> {
        let obj = self.obj;
        mem::forget(self);
        obj
    }
}

impl<T: Poolable + Send + 'static> Deref for Handle<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: the handle owns the object until it is returned.
        unsafe { self.obj.as_ref() }
    }
}

impl<T: Poolable + Send + 'static> DerefMut for Handle<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as above, plus `&mut self` guarantees uniqueness.
        unsafe { self.obj.as_mut() }
    }
}

impl<T: Poolable + Send + 'static> Drop for Handle<'_, T> {
    fn drop(&mut self) {
        self.pool.release(self.obj);
    }
}
