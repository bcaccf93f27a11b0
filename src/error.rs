use std::fmt;

/// Unified error type for pool construction.
///
/// Runtime operations never fail: growth exhaustion is reported as an empty
/// option from `get`/`get_n` and as blocking from `get_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No allocator was configured
    MissingAllocator,

    /// No cleaner was configured
    MissingCleaner,

    /// Cleanup is enabled with a zero interval
    InvalidCleanupInterval,

    /// Cleanup is enabled with a non-positive minimum usage count
    InvalidMinUsageCount,

    /// Growth control is enabled with a non-positive maximum pool size
    InvalidMaxPoolSize,

    /// The background cleanup worker could not be spawned
    SpawnFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingAllocator => write!(f, "no allocator configured"),
            Error::MissingCleaner => write!(f, "no cleaner configured"),
            Error::InvalidCleanupInterval => {
                write!(f, "cleanup interval must be greater than 0")
            }
            Error::InvalidMinUsageCount => {
                write!(f, "minimum usage count must be greater than 0")
            }
            Error::InvalidMaxPoolSize => {
                write!(f, "max pool size must be greater than 0")
            }
            Error::SpawnFailed => {
                write!(f, "failed to spawn cleanup thread")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for pool construction.
pub type Result<T> = std::result::Result<T, Error>;
