//! Constants used throughout the connection pool
//!
//! This module centralizes sizing and timing defaults so they are not
//! duplicated across configuration validation, the reclaimer, and tests.

use std::time::Duration;

/// Pool sizing constants
pub mod pool {
    /// Default minimum number of warm connections to maintain
    pub const DEFAULT_MIN_POOL_SIZE: usize = 2;

    /// Default maximum number of connections per pool
    pub const DEFAULT_MAX_POOL_SIZE: usize = 10;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Default idle time before a connection becomes eligible for reclamation
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

    /// Default interval between idle reclaimer sweeps
    pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

    /// Lowest accepted `idle_timeout`
    ///
    /// Anything shorter churns connections faster than they pay back their
    /// establishment cost.
    pub const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Lowest accepted `check_interval`
    pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

    /// Acquire budgets below this threshold are treated as "do not wait"
    pub const ACQUIRE_EPSILON: Duration = Duration::from_millis(1);
}
