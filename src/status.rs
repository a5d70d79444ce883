//! Pool observability: occupancy snapshots and reclaimer metrics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Momentarily-consistent snapshot of pool occupancy
///
/// Taken under the pool's bookkeeping lock, but stale the instant it is
/// returned: another task may acquire or release concurrently. Use it for
/// monitoring, not for admission decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections sitting in the idle set
    pub idle: usize,
    /// Connections currently checked out
    pub active: usize,
    /// Total live connections (`idle + active`)
    pub total: usize,
    /// Configured ceiling
    pub max_size: usize,
}

impl PoolStatus {
    /// Fraction of capacity currently checked out (0.0 to 1.0)
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        self.active as f64 / self.max_size as f64
    }

    /// Whether the pool cannot grow any further
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.total >= self.max_size
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} active / {} idle / {} max",
            self.active, self.idle, self.max_size
        )
    }
}

/// Counters for idle reclamation sweeps (lock-free)
///
/// One instance per pool, updated by the background reclaimer and by manual
/// `close_idle` calls alike.
#[derive(Debug, Default)]
pub struct ReclaimMetrics {
    cycles_run: AtomicU64,
    connections_reclaimed: AtomicU64,
}

impl ReclaimMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one sweep and how many connections it reclaimed
    pub(crate) fn record_cycle(&self, reclaimed: u64) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        self.connections_reclaimed
            .fetch_add(reclaimed, Ordering::Relaxed);
    }

    /// Total number of sweeps run
    #[must_use]
    pub fn cycles_run(&self) -> u64 {
        self.cycles_run.load(Ordering::Relaxed)
    }

    /// Total number of connections reclaimed over the pool's lifetime
    #[must_use]
    pub fn connections_reclaimed(&self) -> u64 {
        self.connections_reclaimed.load(Ordering::Relaxed)
    }
}
