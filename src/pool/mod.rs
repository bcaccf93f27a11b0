//! Sharded lock-free object pool.
//!
//! Callers map to one of N cache-line padded shards by worker affinity; each
//! shard is an intrusive LIFO stack of idle objects. Get/put are CAS loops on
//! the shard head, growth is capped by an atomic length counter, and a
//! background worker periodically evicts objects that failed to earn enough
//! usage within a cleanup window.

mod cleanup;
mod handle;

pub use handle::Handle;

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::epoch;
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use crate::affinity::current_worker_id;
use crate::config::{
    default_shard_count, Allocator, Cleaner, CleanupPolicy, Config, GrowthPolicy,
};
use crate::error::{Error, Result};
use crate::node::Poolable;
use crate::shard::Shard;

/// Tells the background cleanup worker to exit.
struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

/// State shared between the pool facade and the cleanup worker.
struct PoolInner<T> {
    shards: Box<[CachePadded<Shard<T>>]>,

    /// Currently waiting callers per shard; `put_block` hands its object to
    /// the shard with the highest entry.
    blocked: Box<[CachePadded<AtomicI64>]>,

    /// Distinct live objects the pool accounts for: resident on shards plus
    /// checked out. Updated on allocation, growth-limited denial, eviction,
    /// and drain.
    current_len: AtomicI64,

    allocator: Allocator<T>,
    cleaner: Cleaner<T>,
    cleanup: CleanupPolicy,
    growth: GrowthPolicy,
    stop: StopSignal,
}

/// Generic object pool sharded across per-worker lock-free stacks.
///
/// Objects embed their own list linkage (see [`Poolable`]), so a put never
/// allocates. `get`/`put` are non-blocking; `get_block`/`put_block` add a
/// wait/signal handshake for growth-limited pools. An optional background
/// worker prunes objects that see too little use.
pub struct ShardedPool<T: Poolable + Send + 'static> {
    inner: Arc<PoolInner<T>>,
    cleanup_thread: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T: Poolable + Send + 'static> ShardedPool<T> {
    /// Create a pool with the default configuration: moderate cleanup,
    /// unbounded growth.
    pub fn new(
        allocator: impl Fn() -> T + Send + Sync + 'static,
        cleaner: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self::with_config(Config::new(allocator, cleaner))
            .expect("default configuration is valid")
    }

    /// Create a pool from an explicit configuration.
    pub fn with_config(config: Config<T>) -> Result<Self> {
        let Config {
            cleanup,
            growth,
            allocator,
            cleaner,
            shard_count_override,
        } = config;

        let allocator = allocator.ok_or(Error::MissingAllocator)?;
        let cleaner = cleaner.ok_or(Error::MissingCleaner)?;
        if cleanup.enabled {
            if cleanup.interval.is_zero() {
                return Err(Error::InvalidCleanupInterval);
            }
            if cleanup.min_usage_count <= 0 {
                return Err(Error::InvalidMinUsageCount);
            }
        }
        if growth.enable && growth.max_pool_size <= 0 {
            return Err(Error::InvalidMaxPoolSize);
        }

        let num_shards = shard_count_override
            .unwrap_or_else(default_shard_count)
            .max(1);

        let inner = Arc::new(PoolInner {
            shards: (0..num_shards)
                .map(|_| CachePadded::new(Shard::new()))
                .collect(),
            blocked: (0..num_shards)
                .map(|_| CachePadded::new(AtomicI64::new(0)))
                .collect(),
            current_len: AtomicI64::new(0),
            allocator,
            cleaner,
            cleanup,
            growth,
            stop: StopSignal {
                stopped: Mutex::new(false),
                cond: Condvar::new(),
            },
        });

        let pool = Self {
            inner,
            cleanup_thread: Mutex::new(None),
            closed: AtomicBool::new(false),
        };
        if pool.inner.cleanup.enabled {
            let worker = cleanup::spawn(Arc::clone(&pool.inner)).map_err(|e| {
                tracing::warn!("failed to spawn cleanup thread: {}", e);
                Error::SpawnFailed
            })?;
            *pool.cleanup_thread.lock() = Some(worker);
        }
        Ok(pool)
    }

    /// The caller's shard and its index.
    #[inline]
    fn local_shard(&self) -> (&Shard<T>, usize) {
        let idx = current_worker_id() % self.inner.shards.len();
        (&self.inner.shards[idx], idx)
    }

    /// Pop from `shard` and prepare the object for checkout.
    fn pop_ready(&self, shard: &Shard<T>) -> Option<NonNull<T>> {
        let guard = epoch::pin();
        let obj = shard.pop(&guard)?;
        // Safety: the pop transferred ownership to us.
        let node = unsafe { obj.as_ref() }.node();
        node.store_next(ptr::null_mut());
        node.increment_usage();
        Some(obj)
    }

    /// Allocate a fresh object if the growth policy permits.
    fn try_allocate(&self) -> Option<Handle<'_, T>> {
        let inner = &*self.inner;
        if inner.growth.enable {
            // Reserve a slot first and back out on denial, so the counter
            // never admits more than `max_pool_size` distinct objects.
            let prev = inner.current_len.fetch_add(1, Ordering::AcqRel);
            if prev >= inner.growth.max_pool_size {
                inner.current_len.fetch_sub(1, Ordering::AcqRel);
                return None;
            }
        } else {
            inner.current_len.fetch_add(1, Ordering::Relaxed);
        }

        let obj = Box::new((inner.allocator)());
        obj.node().increment_usage();
        Some(Handle::new(self, NonNull::from(Box::leak(obj))))
    }

    /// Take an object from the caller's shard, or allocate one if the growth
    /// policy allows. `None` when the pool is growth-limited and the shard is
    /// empty. Never blocks.
    pub fn get(&self) -> Option<Handle<'_, T>> {
        let (shard, _) = self.local_shard();
        if let Some(obj) = self.pop_ready(shard) {
            return Some(Handle::new(self, obj));
        }
        self.try_allocate()
    }

    /// Repeat [`get`](Self::get) `n` times. Growth-limited misses stay in the
    /// result as `None`, so the returned vector always has length `n`.
    pub fn get_n(&self, n: usize) -> Vec<Option<Handle<'_, T>>> {
        (0..n).map(|_| self.get()).collect()
    }

    /// Clean `obj` and return it to the caller's shard.
    pub fn put(&self, obj: Handle<'_, T>) {
        self.release(obj.into_raw());
    }

    /// Return every handle in `objs` to the pool.
    pub fn put_n<'a>(&self, objs: impl IntoIterator<Item = Handle<'a, T>>) {
        for obj in objs {
            self.put(obj);
        }
    }

    /// Like [`get`](Self::get), but when the pool is growth-limited and the
    /// caller's shard is empty, waits until a `put_block` hands an object
    /// over. May block indefinitely.
    pub fn get_block(&self) -> Handle<'_, T> {
        let (shard, idx) = self.local_shard();
        if let Some(obj) = self.pop_ready(shard) {
            return Handle::new(self, obj);
        }
        if let Some(handle) = self.try_allocate() {
            return handle;
        }

        let waiters = &self.inner.blocked[idx];
        waiters.fetch_add(1, Ordering::Relaxed);
        let mut slot = shard.waiter_lock.lock();
        loop {
            if let Some(obj) = self.pop_ready(shard) {
                waiters.fetch_sub(1, Ordering::Relaxed);
                return Handle::new(self, obj);
            }
            shard.available.wait(&mut slot);
        }
    }

    /// Clean `obj`, hand it to the shard with the most blocked callers, and
    /// wake one of them.
    pub fn put_block(&self, obj: Handle<'_, T>) {
        let obj = obj.into_raw();
        if self.clean_or_discard(obj) {
            return;
        }
        let shard = &self.inner.shards[self.most_blocked_shard()];
        shard.push(obj);
        // Holding the lock orders this wake after any waiter's empty-check;
        // a notify landing between that check and the wait would be lost.
        drop(shard.waiter_lock.lock());
        shard.available.notify_one();
    }

    /// Shard index with the most waiters; lowest index wins ties.
    fn most_blocked_shard(&self) -> usize {
        let mut best = 0;
        let mut max_blocked = i64::MIN;
        for (idx, count) in self.inner.blocked.iter().enumerate() {
            let blocked = count.load(Ordering::Relaxed);
            if blocked > max_blocked {
                max_blocked = blocked;
                best = idx;
            }
        }
        best
    }

    /// Number of distinct objects the pool currently accounts for, resident
    /// plus checked out.
    pub fn len(&self) -> i64 {
        self.inner.current_len.load(Ordering::Relaxed)
    }

    /// Whether the pool accounts for no objects at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the cleanup worker, then drain every shard running the cleaner on
    /// each drained object. Idempotent; later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut stopped = self.inner.stop.stopped.lock();
            *stopped = true;
            self.inner.stop.cond.notify_all();
        }
        if let Some(worker) = self.cleanup_thread.lock().take() {
            let _ = worker.join();
        }
        // A release that read the closed flag before the flip above may still
        // re-publish an object while a drain pass runs; keep sweeping until a
        // full pass finds every shard empty.
        while cleanup::drain(&self.inner) > 0 {}
    }

    /// Run the cleaner; afterwards, if the pool is closed, drop the object
    /// outright and report `true`.
    fn clean_or_discard(&self, obj: NonNull<T>) -> bool {
        let mut owned = obj;
        // Safety: the handle gave up its exclusive ownership of `obj`.
        unsafe { (self.inner.cleaner)(owned.as_mut()) };
        if self.closed.load(Ordering::Acquire) {
            // The shards are drained; the object leaves the pool instead of
            // resurrecting on one of them.
            self.inner.current_len.fetch_sub(1, Ordering::AcqRel);
            drop(unsafe { Box::from_raw(obj.as_ptr()) });
            return true;
        }
        false
    }

    /// Common return path for explicit puts and handle drops.
    fn release(&self, obj: NonNull<T>) {
        if self.clean_or_discard(obj) {
            return;
        }
        let (shard, _) = self.local_shard();
        shard.push(obj);
    }
}

impl<T: Poolable + Send + 'static> Drop for ShardedPool<T> {
    fn drop(&mut self) {
        self.close();
        // close() is a no-op on an already-closed pool; now that no callers
        // remain, one final sweep catches any straggler a racing release
        // published after that earlier close returned.
        cleanup::drain(&self.inner);
    }
}
