//! Capability traits the pool requires from connections
//!
//! The pool treats a connection as an opaque session: it needs to create
//! one, ask whether an operation is in flight, and tear it down. Everything
//! else (executing remote commands, streaming results, reconnection policy)
//! belongs to the connection type and whoever has it checked out.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::PoolConfig;

/// Capability set the pool needs from a live connection
pub trait ManagedConnection: Send + 'static {
    /// Whether an operation is currently in flight on this connection
    ///
    /// Releasing a busy connection is refused; the caller must let the
    /// operation finish first.
    fn is_busy(&self) -> bool;

    /// Tear down the underlying session
    ///
    /// Must not block. Network-level teardown beyond dropping the socket
    /// belongs to the connection's own `Drop` handling.
    fn terminate(&mut self);
}

/// Factory for new connections - makes it easy to swap implementations
///
/// Implementors perform the expensive part: handshake, authentication, and
/// session allocation on the remote side. The pool calls `create` during
/// construction (to warm `min_pool_size` connections) and during on-demand
/// growth in `acquire`.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: ManagedConnection;

    /// Establish one new connection to the engine described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established; the pool
    /// surfaces it to the caller that triggered the creation.
    async fn create(&self, config: &PoolConfig) -> Result<Self::Connection>;
}

/// Managers can be shared: the pool takes ownership of its manager, and an
/// `Arc` lets the caller keep a handle for introspection or reuse.
#[async_trait]
impl<M: ConnectionManager> ConnectionManager for Arc<M> {
    type Connection = M::Connection;

    async fn create(&self, config: &PoolConfig) -> Result<Self::Connection> {
        (**self).create(config).await
    }
}
