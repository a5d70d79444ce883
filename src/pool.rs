//! The connection pool core: bounded creation, acquire/release, idle
//! reclamation, and orderly shutdown
//!
//! All bookkeeping (the idle and used sets, the shutdown flag) lives behind
//! a single mutex that is never held across an await point. Blocked
//! acquirers park on a [`Notify`] and re-check their exit conditions on
//! every wake, so spurious wakeups are harmless and a shutdown mid-wait
//! fails fast instead of waiting out the caller's budget.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::constants::timing::ACQUIRE_EPSILON;
use crate::entry::{EntryInner, PoolEntry};
use crate::error::PoolError;
use crate::manager::{ConnectionManager, ManagedConnection};
use crate::status::{PoolStatus, ReclaimMetrics};

/// Mutable bookkeeping, guarded by `Shared::inner`
struct Books<C> {
    idle: VecDeque<Arc<EntryInner<C>>>,
    used: HashMap<u64, Arc<EntryInner<C>>>,
    /// Capacity slots reserved by in-flight connection creations
    pending_creates: usize,
    is_shutdown: bool,
}

impl<C> Books<C> {
    fn total(&self) -> usize {
        self.idle.len() + self.used.len()
    }
}

struct Shared<M: ConnectionManager> {
    config: PoolConfig,
    manager: M,
    inner: Mutex<Books<M::Connection>>,
    /// Wakes blocked acquirers; one permit per freed slot
    available: Notify,
    shutdown_tx: broadcast::Sender<()>,
    reclaimer: Mutex<Option<JoinHandle<()>>>,
    next_entry_id: AtomicU64,
    metrics: ReclaimMetrics,
}

impl<M: ConnectionManager> Shared<M> {
    fn books(&self) -> MutexGuard<'_, Books<M::Connection>> {
        self.inner.lock().expect("pool state lock poisoned")
    }
}

/// Bounded pool of connections to a remote execution engine
///
/// The pool hands out [`PoolEntry`] handles under mutual exclusion: a
/// connection is owned by exactly one caller from `acquire` until
/// `release`. Cloning the pool is cheap and clones share all state.
///
/// Lifecycle is explicit: [`connect`](Self::connect) warms the pool,
/// [`shutdown`](Self::shutdown) drains it. Dropping the pool without a
/// shutdown leaves connections to close on drop and the reclaimer to exit
/// on its next tick.
pub struct ConnectionPool<M: ConnectionManager> {
    shared: Arc<Shared<M>>,
}

impl<M: ConnectionManager> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: ConnectionManager> fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.shared.config.name())
            .field("status", &self.status())
            .finish()
    }
}

impl<M: ConnectionManager> ConnectionPool<M> {
    /// Create a pool and warm it to `min_pool_size` connections
    ///
    /// Connections are established sequentially. If any of them fails, the
    /// ones already created are terminated and the error is returned; a
    /// half-initialized pool is never observable. The idle reclaimer is
    /// started once warming succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConnectionCreation`] if the manager fails to
    /// establish any of the initial connections.
    pub async fn connect(config: PoolConfig, manager: M) -> Result<Self, PoolError> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let shared = Arc::new(Shared {
            config,
            manager,
            inner: Mutex::new(Books {
                idle: VecDeque::new(),
                used: HashMap::new(),
                pending_creates: 0,
                is_shutdown: false,
            }),
            available: Notify::new(),
            shutdown_tx,
            reclaimer: Mutex::new(None),
            next_entry_id: AtomicU64::new(1),
            metrics: ReclaimMetrics::new(),
        });

        let min = shared.config.min_pool_size();
        let mut warm = Vec::with_capacity(min);
        for _ in 0..min {
            match shared.manager.create(&shared.config).await {
                Ok(conn) => {
                    let id = shared.next_entry_id.fetch_add(1, Ordering::Relaxed);
                    warm.push(EntryInner::new(id, conn, true));
                }
                Err(e) => {
                    for entry in warm {
                        entry.close().await;
                    }
                    return Err(PoolError::ConnectionCreation(e));
                }
            }
        }
        shared.books().idle.extend(warm);

        let handle = spawn_reclaimer(&shared, shutdown_rx);
        *shared
            .reclaimer
            .lock()
            .expect("reclaimer handle lock poisoned") = Some(handle);

        info!(
            pool = %shared.config.name(),
            warm = min,
            max = shared.config.max_pool_size(),
            "connection pool ready"
        );
        Ok(Self { shared })
    }

    /// Check a connection out of the pool
    ///
    /// Hands back an idle connection when one exists, grows the pool when
    /// below `max_pool_size`, and otherwise waits for a slot for up to
    /// `wait`. `None` means "do not wait"; budgets under a millisecond are
    /// treated the same way. The budget is measured against the wall clock
    /// from the moment of the call, so repeated wakeups never extend it.
    ///
    /// Wakeup order among concurrent waiters is unordered; no fairness is
    /// promised under sustained contention.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Shutdown`] if the pool is (or becomes) shut down.
    /// - [`PoolError::Exhausted`] if `wait` is `None` and the pool is at
    ///   capacity with nothing idle.
    /// - [`PoolError::AcquireTimeout`] if `wait` elapsed first.
    /// - [`PoolError::ConnectionCreation`] if on-demand growth failed; the
    ///   reserved capacity slot is rolled back.
    pub async fn acquire(
        &self,
        wait: Option<Duration>,
    ) -> Result<PoolEntry<M::Connection>, PoolError> {
        let started = Instant::now();
        loop {
            let mut notified = pin!(self.shared.available.notified());
            let remaining = {
                let mut books = self.shared.books();
                if books.is_shutdown {
                    return Err(PoolError::Shutdown);
                }
                if let Some(entry) = books.idle.pop_front() {
                    let generation = entry.begin_checkout();
                    books.used.insert(entry.id(), Arc::clone(&entry));
                    return Ok(PoolEntry::new(entry, generation));
                }
                if books.total() + books.pending_creates < self.shared.config.max_pool_size() {
                    books.pending_creates += 1;
                    // `None` signals the grow path; the actual await happens
                    // below, after this guard has left scope, so the future
                    // stays `Send`.
                    None
                } else {
                    let remaining = match wait {
                        None => {
                            return Err(PoolError::Exhausted {
                                max_size: self.shared.config.max_pool_size(),
                            });
                        }
                        Some(budget) => {
                            let left = budget.saturating_sub(started.elapsed());
                            if left < ACQUIRE_EPSILON {
                                return Err(PoolError::AcquireTimeout {
                                    waited: started.elapsed(),
                                });
                            }
                            left
                        }
                    };
                    // Register for wakeup before the lock drops; a release
                    // landing in between then wakes this waiter instead of
                    // falling back to the single stored permit.
                    notified.as_mut().enable();
                    Some(remaining)
                }
            };
            match remaining {
                // Reserved a slot above: grow the pool now that the lock is
                // released.
                None => return self.create_checked_out().await,
                // A wake that finds nothing usable simply loops and waits out
                // the remainder of the budget.
                Some(remaining) => {
                    let _ = timeout(remaining, notified).await;
                }
            }
        }
    }

    /// Establish a new connection for a caller that reserved a slot
    async fn create_checked_out(&self) -> Result<PoolEntry<M::Connection>, PoolError> {
        debug!(pool = %self.shared.config.name(), "growing pool with a new connection");
        let created = self.shared.manager.create(&self.shared.config).await;

        let mut books = self.shared.books();
        books.pending_creates -= 1;
        match created {
            Err(e) => {
                drop(books);
                // The reserved slot is free again; let one waiter retry it.
                self.shared.available.notify_one();
                Err(PoolError::ConnectionCreation(e))
            }
            Ok(conn) => {
                if books.is_shutdown {
                    drop(books);
                    let mut conn = conn;
                    conn.terminate();
                    return Err(PoolError::Shutdown);
                }
                let id = self.shared.next_entry_id.fetch_add(1, Ordering::Relaxed);
                let entry = EntryInner::new(id, conn, false);
                let generation = entry.begin_checkout();
                books.used.insert(id, Arc::clone(&entry));
                Ok(PoolEntry::new(entry, generation))
            }
        }
    }

    /// Return a checked-out connection to the pool
    ///
    /// On success the entry moves to the idle set, its reclamation clock is
    /// refreshed, and exactly one blocked waiter is woken. After a
    /// shutdown, release is a bookkeeping no-op: the entry was already
    /// drained and its connection closed by the shutdown path.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ForeignEntry`] if the entry is not the live checkout
    ///   of one of this pool's slots (double release, stale handle, or an
    ///   entry from another pool). Pool state is untouched.
    /// - [`PoolError::BusyConnection`] if the connection reports an
    ///   operation in flight, or its guard is still held. The entry remains
    ///   checked out.
    pub async fn release(&self, entry: &PoolEntry<M::Connection>) -> Result<(), PoolError> {
        let mut books = self.shared.books();
        if books.is_shutdown {
            return Ok(());
        }
        let current = match books.used.get(&entry.inner().id()) {
            Some(held)
                if Arc::ptr_eq(held, entry.inner())
                    && entry.generation() == held.checkout_generation() =>
            {
                Arc::clone(held)
            }
            _ => return Err(PoolError::ForeignEntry),
        };
        if current.is_busy() {
            return Err(PoolError::BusyConnection);
        }

        books.used.remove(&current.id());
        current.mark_idle();
        books.idle.push_back(current);
        drop(books);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Reclaim idle connections older than `idle_timeout`
    ///
    /// Runs the same sweep the background reclaimer runs, synchronously:
    /// closes idle connections whose last use is older than the configured
    /// `idle_timeout`, never reducing the pool below `min_pool_size`.
    /// Returns the number of connections reclaimed.
    pub async fn close_idle(&self) -> usize {
        reclaim_expired(&self.shared).await
    }

    /// Shut the pool down
    ///
    /// Idempotent. Blocked `acquire` calls are woken and fail with
    /// [`PoolError::Shutdown`] rather than waiting out their budget; the
    /// idle reclaimer is stopped and joined; every connection - idle and
    /// checked out alike - is terminated. A caller still holding an entry
    /// sees its next use fail instead of touching a dead session. After
    /// this returns, all counts are zero.
    pub async fn shutdown(&self) {
        let drained = {
            let mut books = self.shared.books();
            if books.is_shutdown {
                Vec::new()
            } else {
                books.is_shutdown = true;
                let mut drained: Vec<_> = books.idle.drain(..).collect();
                drained.extend(books.used.drain().map(|(_, entry)| entry));
                drained
            }
        };
        self.shared.available.notify_waiters();
        let _ = self.shared.shutdown_tx.send(());

        let reclaimer = self
            .shared
            .reclaimer
            .lock()
            .expect("reclaimer handle lock poisoned")
            .take();
        if let Some(handle) = reclaimer {
            if handle.await.is_err() {
                warn!(pool = %self.shared.config.name(), "idle reclaimer panicked before shutdown");
            }
        }

        if !drained.is_empty() {
            let closed = drained.len();
            for entry in drained {
                entry.close().await;
            }
            info!(pool = %self.shared.config.name(), closed, "connection pool shut down");
        }
    }

    /// Number of connections currently checked out
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.books().used.len()
    }

    /// Number of connections sitting idle
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared.books().idle.len()
    }

    /// Total live connections (idle + active)
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.shared.books().total()
    }

    /// Whether the pool has been shut down
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.books().is_shutdown
    }

    /// One-lock snapshot of pool occupancy
    ///
    /// The counts are consistent with each other but stale as soon as the
    /// call returns.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let books = self.shared.books();
        PoolStatus {
            idle: books.idle.len(),
            active: books.used.len(),
            total: books.total(),
            max_size: self.shared.config.max_pool_size(),
        }
    }

    /// The configuration this pool was built with
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// The connection manager this pool creates connections through
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    /// Counters for idle reclamation sweeps
    #[must_use]
    pub fn reclaim_metrics(&self) -> &ReclaimMetrics {
        &self.shared.metrics
    }
}

/// Spawn the background reclaimer task
///
/// The task holds only a weak reference to the pool, so a pool dropped
/// without an explicit shutdown does not keep it alive past the next tick.
fn spawn_reclaimer<M: ConnectionManager>(
    shared: &Arc<Shared<M>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(shared);
    let interval = shared.config.check_interval();
    let name = shared.config.name().to_string();
    tokio::spawn(async move {
        debug!(pool = %name, interval_secs = interval.as_secs(), "idle reclaimer started");
        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown_rx.recv() => break,
            }
            let Some(shared) = Weak::upgrade(&weak) else {
                break;
            };
            if shared.books().is_shutdown {
                break;
            }
            reclaim_expired(&shared).await;
        }
        debug!(pool = %name, "idle reclaimer stopped");
    })
}

/// One reclamation sweep
///
/// Under the bookkeeping lock, pick idle entries whose last use is older
/// than `idle_timeout`, capped so the pool keeps at least `min_pool_size`
/// connections. Terminating the picked connections happens after the lock
/// is released, so closing a slow session never stalls acquire/release
/// traffic.
async fn reclaim_expired<M: ConnectionManager>(shared: &Shared<M>) -> usize {
    let expired = {
        let mut books = shared.books();
        if books.is_shutdown {
            return 0;
        }
        let budget = books
            .total()
            .saturating_sub(shared.config.min_pool_size());
        if budget == 0 {
            shared.metrics.record_cycle(0);
            return 0;
        }

        let now = Instant::now();
        let idle_timeout = shared.config.idle_timeout();
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(books.idle.len());
        while let Some(entry) = books.idle.pop_front() {
            if expired.len() < budget && now.duration_since(entry.last_used_at()) >= idle_timeout {
                expired.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        books.idle = kept;
        expired
    };

    let reclaimed = expired.len();
    for entry in expired {
        entry.close().await;
        // Each closed connection frees a capacity slot a blocked waiter can
        // use for on-demand growth.
        shared.available.notify_one();
    }
    shared.metrics.record_cycle(reclaimed as u64);
    if reclaimed > 0 {
        debug!(
            pool = %shared.config.name(),
            reclaimed,
            remaining = shared.books().total(),
            "reclaimed idle connections"
        );
    }
    reclaimed
}
