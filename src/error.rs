//! Error types for pool configuration and lifecycle operations
//!
//! All variants are recoverable from the caller's point of view: none of
//! them leaves the pool's bookkeeping in an inconsistent state.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating a [`PoolConfig`](crate::PoolConfig)
///
/// Raised synchronously at construction; an invalid configuration never
/// produces a partially-built config or pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("min_pool_size must be greater than zero")]
    ZeroMinPoolSize,

    #[error("max_pool_size must be greater than zero")]
    ZeroMaxPoolSize,

    #[error("min_pool_size ({min}) exceeds max_pool_size ({max})")]
    MinExceedsMax { min: usize, max: usize },

    #[error("idle_timeout {actual:?} is below the minimum {minimum:?}")]
    IdleTimeoutTooShort { actual: Duration, minimum: Duration },

    #[error("check_interval {actual:?} is below the minimum {minimum:?}")]
    CheckIntervalTooShort { actual: Duration, minimum: Duration },
}

/// Errors raised by pool operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid pool configuration
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// The connection factory failed
    ///
    /// Surfaces to whichever `acquire` call (or the constructor) triggered
    /// the creation; the reserved capacity slot is rolled back.
    #[error("connection creation failed: {0}")]
    ConnectionCreation(anyhow::Error),

    /// `acquire` without a wait budget found the pool at capacity
    #[error("pool exhausted: all {max_size} connections are in use")]
    Exhausted { max_size: usize },

    /// A positive `acquire` budget elapsed before a connection freed up
    #[error("timed out after {waited:?} waiting for a connection")]
    AcquireTimeout { waited: Duration },

    /// The pool has been shut down (or shut down mid-wait)
    #[error("pool is shut down")]
    Shutdown,

    /// `release` was called while the connection reports an operation in flight
    #[error("connection has an operation in flight and cannot be released")]
    BusyConnection,

    /// `release` was called with an entry not currently checked out from this pool
    ///
    /// Covers double release, handles kept across a later checkout of the
    /// same slot, and entries belonging to another pool.
    #[error("entry is not checked out from this pool")]
    ForeignEntry,
}

impl PoolError {
    /// Whether the operation failed because the caller's wait budget ran out
    ///
    /// Callers distinguishing "no capacity, no wait requested" from "waited,
    /// deadline exceeded" can match on [`PoolError::Exhausted`] directly.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::AcquireTimeout { .. })
    }

    /// Whether the operation failed because the pool is shut down
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}
