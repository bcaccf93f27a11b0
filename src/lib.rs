//! Sharded lock-free object pool for reusing long-lived heap allocations
//! across many concurrent workers.
//!
//! Pooled objects carry their own list linkage (two intrusive atomic fields,
//! see [`PoolNode`]), so shelving an object never allocates a wrapper. Idle
//! objects sit on per-worker shards, each an independent lock-free LIFO on
//! its own cache line; a usage-count-driven background pass evicts objects
//! that stopped earning their keep.
//!
//! # Quick start
//!
//! ```
//! use shardpool::{PoolNode, Poolable, ShardedPool};
//!
//! struct Frame {
//!     payload: Vec<u8>,
//!     node: PoolNode<Frame>,
//! }
//!
//! impl Poolable for Frame {
//!     fn node(&self) -> &PoolNode<Frame> {
//!         &self.node
//!     }
//! }
//!
//! let pool = ShardedPool::new(
//!     || Frame { payload: Vec::with_capacity(4096), node: PoolNode::new() },
//!     |frame: &mut Frame| frame.payload.clear(),
//! );
//!
//! let mut frame = pool.get().expect("unbounded pools always yield");
//! frame.payload.extend_from_slice(b"hello");
//! pool.put(frame);
//!
//! pool.close();
//! ```
//!
//! Growth-limited pools return `None` from [`ShardedPool::get`] when
//! exhausted; [`ShardedPool::get_block`] instead parks the caller until a
//! [`ShardedPool::put_block`] hands an object over. For callers that do not
//! want intrusive fields, [`SimplePool`] trades the lock-free sharding for a
//! plain bounded queue.

mod affinity;
pub mod config;
pub mod error;
pub mod node;
pub mod pool;
mod shard;
pub mod simple;

pub use config::{
    default_cleanup_policy, Allocator, Cleaner, CleanupLevel, CleanupPolicy, Config, GrowthPolicy,
};
pub use error::{Error, Result};
pub use node::{PoolNode, Poolable};
pub use pool::{Handle, ShardedPool};
pub use simple::SimplePool;
