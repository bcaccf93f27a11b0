//! Worker-to-shard affinity.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_WORKER_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Identifier for the calling worker, assigned round-robin on a thread's
/// first pool operation and stable for the life of the thread.
///
/// The pool only needs the id to be cheap and fixed for the extent of one
/// call; round-robin assignment additionally spreads concurrent workers
/// across shards.
#[inline]
pub(crate) fn current_worker_id() -> usize {
    WORKER_ID.with(|id| match id.get() {
        Some(v) => v,
        None => {
            let v = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
            id.set(Some(v));
            v
        }
    })
}
