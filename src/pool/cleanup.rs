//! Two-pass usage-driven eviction.
//!
//! Each tick the worker detaches a shard's whole list with one CAS, walks it
//! privately, keeps objects that earned at least `min_usage_count` checkouts
//! in the window (resetting their counters), drops the rest, and prepends the
//! kept chain back onto the shard. An object therefore survives only by being
//! used between consecutive passes; the reset-and-retest gives a grace window
//! of one interval.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::epoch;

use crate::node::Poolable;
use crate::pool::PoolInner;
use crate::shard::Shard;

/// Spawn the background worker that prunes every shard each interval.
pub(super) fn spawn<T: Poolable + Send + 'static>(
    inner: Arc<PoolInner<T>>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("shardpool-cleanup".into())
        .spawn(move || run(&inner))
}

fn run<T: Poolable + Send + 'static>(inner: &PoolInner<T>) {
    let interval = inner.cleanup.interval;
    let mut stopped = inner.stop.stopped.lock();
    loop {
        if *stopped {
            return;
        }
        let timed_out = inner.stop.cond.wait_for(&mut stopped, interval).timed_out();
        if *stopped {
            return;
        }
        if !timed_out {
            // Spurious wake; go back to sleep.
            continue;
        }
        drop(stopped);
        let evicted = cleanup_pass(inner);
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle objects");
        }
        stopped = inner.stop.stopped.lock();
    }
}

/// One eviction sweep over all shards; returns the number of evicted objects.
pub(super) fn cleanup_pass<T: Poolable + Send>(inner: &PoolInner<T>) -> i64 {
    inner
        .shards
        .iter()
        .map(|shard| cleanup_shard(inner, shard))
        .sum()
}

fn cleanup_shard<T: Poolable + Send>(inner: &PoolInner<T>, shard: &Shard<T>) -> i64 {
    // Single attempt: a contended shard is skipped until the next tick.
    let Some(detached) = shard.try_detach() else {
        return 0;
    };

    let guard = epoch::pin();
    let mut kept: Option<(NonNull<T>, NonNull<T>)> = None;
    let mut evicted = 0i64;
    let mut current = Some(detached);

    while let Some(obj) = current {
        // Safety: the detach handed us sole ownership of the whole chain.
        let node = unsafe { obj.as_ref() }.node();
        current = NonNull::new(node.load_next());

        if node.load_usage() >= inner.cleanup.min_usage_count {
            // Survivor: the counter restarts for the next window.
            node.reset_usage();
            node.store_next(ptr::null_mut());
            match &mut kept {
                None => kept = Some((obj, obj)),
                Some((_, tail)) => {
                    unsafe { tail.as_ref() }.node().store_next(obj.as_ptr());
                    *tail = obj;
                }
            }
        } else {
            node.store_next(ptr::null_mut());
            evicted += 1;
            let raw = obj.as_ptr();
            // The cleaner already ran at the object's last put; it is simply
            // dropped. Safety: no new reader can reach `raw` after the
            // detach, and the deferred free outlives any pop that loaded the
            // pointer before it.
            unsafe { guard.defer_unchecked(move || drop(Box::from_raw(raw))) };
        }
    }

    if evicted > 0 {
        inner.current_len.fetch_sub(evicted, Ordering::AcqRel);
    }
    if let Some((head, tail)) = kept {
        shard.prepend(head, tail);
    }
    evicted
}

/// Empty every shard, running the cleaner on each object (the close-time
/// mirror of its final put) and settling the pool length. Returns how many
/// objects were drained.
pub(super) fn drain<T: Poolable + Send>(inner: &PoolInner<T>) -> i64 {
    let mut drained = 0i64;
    for shard in inner.shards.iter() {
        let Some(detached) = shard.detach() else {
            continue;
        };
        let mut current = Some(detached);
        while let Some(obj) = current {
            // Safety: the detach transferred ownership; the box is ours.
            let node = unsafe { obj.as_ref() }.node();
            current = NonNull::new(node.load_next());
            node.store_next(ptr::null_mut());
            let mut boxed = unsafe { Box::from_raw(obj.as_ptr()) };
            // One panicking cleaner must not abort the drain of the
            // remaining objects and shards.
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| (inner.cleaner)(&mut boxed)));
            if outcome.is_err() {
                tracing::warn!("cleaner panicked during drain; object dropped anyway");
            }
            drained += 1;
        }
    }
    if drained > 0 {
        inner.current_len.fetch_sub(drained, Ordering::AcqRel);
    }
    drained
}
