//! Checked-out connection handles and the pool's per-connection bookkeeping
//!
//! Each connection lives in an `EntryInner` shared between the pool's sets
//! and at most one caller-facing [`PoolEntry`]. Shared ownership is what
//! lets `shutdown` terminate connections that are still checked out: the
//! holder's next use fails instead of crashing the pool.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::time::Instant;

use crate::error::PoolError;
use crate::manager::ManagedConnection;

/// Pool-private state for one connection
pub(crate) struct EntryInner<C> {
    id: u64,
    /// `None` once the connection has been terminated
    conn: Mutex<Option<C>>,
    idle: AtomicBool,
    /// Checkout generation; a handle from an earlier generation is stale
    checkout: AtomicU64,
    last_used_at: StdMutex<Instant>,
}

impl<C: ManagedConnection> EntryInner<C> {
    pub(crate) fn new(id: u64, conn: C, idle: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            conn: Mutex::new(Some(conn)),
            idle: AtomicBool::new(idle),
            checkout: AtomicU64::new(0),
            last_used_at: StdMutex::new(Instant::now()),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    pub(crate) fn checkout_generation(&self) -> u64 {
        self.checkout.load(Ordering::Acquire)
    }

    /// Mark handed out and start a new checkout generation
    pub(crate) fn begin_checkout(&self) -> u64 {
        self.idle.store(false, Ordering::Release);
        self.checkout.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark returned to the idle set and refresh the reclamation clock
    pub(crate) fn mark_idle(&self) {
        *self
            .last_used_at
            .lock()
            .expect("last_used_at lock poisoned") = Instant::now();
        self.idle.store(true, Ordering::Release);
    }

    pub(crate) fn last_used_at(&self) -> Instant {
        *self
            .last_used_at
            .lock()
            .expect("last_used_at lock poisoned")
    }

    /// Non-blocking busy probe used by `release`
    ///
    /// A caller still holding the connection guard counts as busy even
    /// before asking the connection itself.
    pub(crate) fn is_busy(&self) -> bool {
        match self.conn.try_lock() {
            Ok(guard) => guard.as_ref().is_some_and(ManagedConnection::is_busy),
            Err(_) => true,
        }
    }

    /// Take the connection out and terminate it; idempotent
    pub(crate) async fn close(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(mut conn) = conn {
            conn.terminate();
        }
    }
}

/// A connection checked out from the pool
///
/// The underlying connection is exclusively owned by the holder until it is
/// returned through [`ConnectionPool::release`](crate::ConnectionPool::release).
/// The handle is not `Clone`; exactly one caller at a time can reach the
/// connection.
pub struct PoolEntry<C: ManagedConnection> {
    inner: Arc<EntryInner<C>>,
    generation: u64,
}

impl<C: ManagedConnection> PoolEntry<C> {
    pub(crate) fn new(inner: Arc<EntryInner<C>>, generation: u64) -> Self {
        Self { inner, generation }
    }

    pub(crate) fn inner(&self) -> &Arc<EntryInner<C>> {
        &self.inner
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this handle is still the live checkout of its slot
    #[must_use]
    pub fn is_checked_out(&self) -> bool {
        !self.inner.is_idle() && self.generation == self.inner.checkout_generation()
    }

    /// Access the underlying connection
    ///
    /// The guard grants exclusive mutable access; hold it for the duration
    /// of one operation and drop it before releasing the entry.
    ///
    /// # Panics
    ///
    /// Panics if the handle is no longer checked out - it was already
    /// released, or kept across a later checkout of the same slot. Both are
    /// caller bugs; continuing would alias a connection someone else owns.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Shutdown`] if the pool terminated this
    /// connection underneath the holder.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, C>, PoolError> {
        assert!(
            self.is_checked_out(),
            "PoolEntry used after release; acquire a fresh entry instead"
        );
        let guard = self.inner.conn.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| PoolError::Shutdown)
    }
}

impl<C: ManagedConnection> fmt::Debug for PoolEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.inner.id)
            .field("generation", &self.generation)
            .field("checked_out", &self.is_checked_out())
            .finish()
    }
}
