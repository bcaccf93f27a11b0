use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Creates a new, initialized object for the pool.
pub type Allocator<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Resets an object to a reusable state before it is shelved.
///
/// Invoked on every put and on each object drained at close. Eviction does
/// not re-run it: an evicted object was already cleaned at its last put.
pub type Cleaner<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Aggressiveness presets for `default_cleanup_policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupLevel {
    /// No background cleanup; objects stay pooled until close.
    Disable,
    /// Long intervals, minimal aggression. Good for high-reuse workloads.
    Low,
    /// Regular intervals, evicts lightly used objects.
    Moderate,
    /// Frequent cleanup for memory-constrained environments.
    Aggressive,
}

/// Controls how the background worker prunes idle objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Whether automatic cleanup runs at all.
    pub enabled: bool,
    /// How often the eviction pass runs.
    pub interval: Duration,
    /// Objects used fewer than this many times within one interval are
    /// evicted; survivors restart the count at zero.
    pub min_usage_count: i64,
}

/// Default cleanup configuration for the given level.
pub fn default_cleanup_policy(level: CleanupLevel) -> CleanupPolicy {
    match level {
        CleanupLevel::Disable => CleanupPolicy {
            enabled: false,
            interval: Duration::ZERO,
            min_usage_count: 0,
        },
        CleanupLevel::Low => CleanupPolicy {
            enabled: true,
            interval: Duration::from_secs(10 * 60),
            min_usage_count: 1,
        },
        CleanupLevel::Moderate => CleanupPolicy {
            enabled: true,
            interval: Duration::from_secs(2 * 60),
            min_usage_count: 2,
        },
        CleanupLevel::Aggressive => CleanupPolicy {
            enabled: true,
            interval: Duration::from_secs(30),
            min_usage_count: 3,
        },
    }
}

/// Caps how many distinct objects the pool will account for.
///
/// When disabled the pool grows freely and shrinks only through the cleanup
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrowthPolicy {
    /// Activates growth control.
    pub enable: bool,
    /// Ceiling on resident plus checked-out objects when `enable` is set.
    pub max_pool_size: i64,
}

/// Pool configuration, validated at construction.
pub struct Config<T> {
    /// Cleanup policy for the pool.
    pub cleanup: CleanupPolicy,

    /// Growth policy for the pool.
    pub growth: GrowthPolicy,

    /// Function that creates new objects.
    pub allocator: Option<Allocator<T>>,

    /// Function that cleans objects before they re-enter the pool.
    pub cleaner: Option<Cleaner<T>>,

    /// Replaces the CPU-derived shard count when set.
    pub shard_count_override: Option<usize>,
}

impl<T> Config<T> {
    /// Default configuration: moderate cleanup, unbounded growth.
    pub fn new(
        allocator: impl Fn() -> T + Send + Sync + 'static,
        cleaner: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            cleanup: default_cleanup_policy(CleanupLevel::Moderate),
            growth: GrowthPolicy::default(),
            allocator: Some(Box::new(allocator)),
            cleaner: Some(Box::new(cleaner)),
            shard_count_override: None,
        }
    }
}

/// Shard count for pools without an override: available logical CPUs clamped
/// to [8, 128], sampled once per process.
///
/// A process that starts under a small CPU quota and later scales up keeps
/// the count sampled at first use.
pub(crate) fn default_shard_count() -> usize {
    static SHARDS: OnceLock<usize> = OnceLock::new();
    *SHARDS.get_or_init(|| {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .clamp(8, 128)
    })
}
