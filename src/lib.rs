//! Bounded connection pool for remote execution engine sessions
//!
//! Establishing a session against a remote execution engine is expensive:
//! a TCP handshake, authentication, and session allocation on the remote
//! side. This crate keeps a configurable number of connections warm and
//! hands them out under mutual exclusion, so no two callers ever touch the
//! same session concurrently.
//!
//! The pool is generic over a [`ConnectionManager`], which knows how to
//! establish one connection; the pool itself never looks past the
//! capability set in [`ManagedConnection`]. A background reclaimer closes
//! connections that sit idle past the configured timeout, never shrinking
//! the pool below its minimum size.
//!
//! # Example
//!
//! ```
//! use exec_pool::mock::MockManager;
//! use exec_pool::{ConnectionPool, PoolConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let config = PoolConfig::builder("engine.example.com", 9000)
//!     .name("primary")
//!     .min_pool_size(2)
//!     .max_pool_size(5)
//!     .build()?;
//!
//! let pool = ConnectionPool::connect(config, MockManager::new()).await?;
//!
//! let entry = pool.acquire(None).await?;
//! let mut conn = entry.connection().await?;
//! conn.execute("select 1").await?;
//! drop(conn);
//! pool.release(&entry).await?;
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod manager;
pub mod mock;
pub mod pool;
pub mod status;

pub use config::{Builder, PoolConfig};
pub use entry::PoolEntry;
pub use error::{ConfigError, PoolError};
pub use manager::{ConnectionManager, ManagedConnection};
pub use pool::ConnectionPool;
pub use status::{PoolStatus, ReclaimMetrics};
