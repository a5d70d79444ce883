//! Scriptable connection manager for tests and benchmarks
//!
//! This implementation mirrors the shape of a real execution-engine session
//! without touching the network, so pool behavior can be exercised
//! deterministically: creation failures are scripted, busy state is toggled
//! from the outside, and termination is observable after the fact.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::manager::{ConnectionManager, ManagedConnection};

/// Shared handle for inspecting and steering a [`MockConnection`]
///
/// Stays valid after the pool has consumed (or terminated) the connection,
/// which is what tests need to assert on shutdown behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConnectionState {
    busy: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
    executed: Arc<AtomicUsize>,
}

impl MockConnectionState {
    /// Toggle the connection's busy flag
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    /// Whether the connection has been terminated
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Number of commands executed through the connection
    #[must_use]
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Acquire)
    }
}

/// In-memory stand-in for a remote execution engine session
#[derive(Debug)]
pub struct MockConnection {
    state: MockConnectionState,
}

impl MockConnection {
    /// Create a connection plus the external handle that steers it
    #[must_use]
    pub fn new() -> (Self, MockConnectionState) {
        let state = MockConnectionState::default();
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    /// External handle for this connection
    #[must_use]
    pub fn state(&self) -> MockConnectionState {
        self.state.clone()
    }

    /// Pretend to run a remote command
    ///
    /// # Errors
    ///
    /// Fails if the connection has already been terminated.
    pub async fn execute(&mut self, _command: &str) -> Result<()> {
        if self.state.is_terminated() {
            bail!("connection is terminated");
        }
        self.state.executed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl ManagedConnection for MockConnection {
    fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    fn terminate(&mut self) {
        self.state.terminated.store(true, Ordering::Release);
    }
}

/// Scripted outcome for one upcoming create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeed,
    Fail,
}

/// Factory producing [`MockConnection`]s, with optional scripted failures
#[derive(Debug, Default)]
pub struct MockManager {
    created: AtomicUsize,
    /// Outcomes for upcoming create calls; creates succeed once drained
    script: Mutex<VecDeque<Outcome>>,
    create_delay: Option<Duration>,
    states: Mutex<Vec<MockConnectionState>>,
}

impl MockManager {
    /// Create a manager whose connections appear instantly
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that sleeps `delay` per connection, simulating the
    /// handshake latency the caller experiences during on-demand growth
    #[must_use]
    pub fn with_create_delay(delay: Duration) -> Self {
        Self {
            create_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make the next `count` create calls fail
    pub fn fail_times(&self, count: usize) {
        let mut script = self.script.lock().expect("script lock poisoned");
        script.extend(std::iter::repeat_n(Outcome::Fail, count));
    }

    /// Let the next `count` create calls succeed before any scripted failures
    pub fn succeed_times(&self, count: usize) {
        let mut script = self.script.lock().expect("script lock poisoned");
        script.extend(std::iter::repeat_n(Outcome::Succeed, count));
    }

    /// Total number of connections successfully created
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Handles to every connection created so far, in creation order
    #[must_use]
    pub fn connection_states(&self) -> Vec<MockConnectionState> {
        self.states.lock().expect("states lock poisoned").clone()
    }
}

#[async_trait]
impl ConnectionManager for MockManager {
    type Connection = MockConnection;

    async fn create(&self, config: &PoolConfig) -> Result<MockConnection> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        if outcome == Some(Outcome::Fail) {
            bail!("scripted connection failure to {}", config.name());
        }

        let (conn, state) = MockConnection::new();
        self.created.fetch_add(1, Ordering::AcqRel);
        self.states
            .lock()
            .expect("states lock poisoned")
            .push(state);
        Ok(conn)
    }
}
