//! Pool lifecycle tests: construction invariants, the documented
//! acquire/release scenario, and shutdown semantics

use std::sync::Arc;
use std::time::Duration;

use exec_pool::mock::MockManager;
use exec_pool::{ConnectionPool, PoolConfig, PoolError};

fn test_config(min: usize, max: usize) -> PoolConfig {
    PoolConfig::builder("engine.test", 9000)
        .min_pool_size(min)
        .max_pool_size(max)
        .idle_timeout(Duration::from_secs(30))
        .check_interval(Duration::from_secs(10))
        .build()
        .expect("valid test config")
}

#[tokio::test(start_paused = true)]
async fn test_construction_invariant() {
    let pool = ConnectionPool::connect(test_config(2, 5), MockManager::new())
        .await
        .unwrap();

    assert_eq!(pool.total_count(), 2);
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.active_count(), 0);
    assert!(!pool.is_shutdown());

    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.max_size, 5);
    assert!(!status.is_full());

    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_counts_stay_consistent_through_acquire_release() {
    let pool = ConnectionPool::connect(test_config(2, 5), MockManager::new())
        .await
        .unwrap();

    let mut entries = Vec::new();
    for _ in 0..4 {
        entries.push(pool.acquire(None).await.unwrap());
        let status = pool.status();
        assert_eq!(status.active + status.idle, status.total);
        assert!(status.total <= status.max_size);
    }

    for entry in &entries {
        pool.release(entry).await.unwrap();
        let status = pool.status();
        assert_eq!(status.active + status.idle, status.total);
    }

    pool.shutdown().await;
}

/// The documented scenario: min=2, max=5, idle_timeout=30s, check=10s
#[tokio::test(start_paused = true)]
async fn test_acquire_release_close_idle_scenario() {
    let manager = Arc::new(MockManager::new());
    let pool = ConnectionPool::connect(test_config(2, 5), Arc::clone(&manager))
        .await
        .unwrap();

    // Three acquires: two warm connections plus one created on demand
    let first = pool.acquire(None).await.unwrap();
    let second = pool.acquire(None).await.unwrap();
    let third = pool.acquire(None).await.unwrap();
    assert_eq!(pool.total_count(), 3);
    assert_eq!(pool.active_count(), 3);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(manager.created(), 3);

    pool.release(&first).await.unwrap();
    pool.release(&second).await.unwrap();
    pool.release(&third).await.unwrap();
    assert_eq!(pool.idle_count(), 3);

    // Once the connections have sat idle past the timeout, reclamation
    // shrinks the pool back to its floor.
    tokio::time::sleep(Duration::from_secs(31)).await;
    pool.close_idle().await;
    assert_eq!(pool.total_count(), 2);
    assert_eq!(pool.idle_count(), 2);

    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_released_connection_is_reused() {
    let manager = Arc::new(MockManager::new());
    let pool = ConnectionPool::connect(test_config(1, 2), Arc::clone(&manager))
        .await
        .unwrap();
    assert_eq!(manager.created(), 1);

    let entry = pool.acquire(None).await.unwrap();
    pool.release(&entry).await.unwrap();

    let again = pool.acquire(None).await.unwrap();
    pool.release(&again).await.unwrap();

    // No on-demand growth happened; the warm connection served both
    assert_eq!(manager.created(), 1);
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_terminates_everything() {
    let manager = Arc::new(MockManager::new());
    let pool = ConnectionPool::connect(test_config(2, 3), Arc::clone(&manager))
        .await
        .unwrap();

    // One connection stays checked out across the shutdown
    let held = pool.acquire(None).await.unwrap();
    assert_eq!(pool.active_count(), 1);
    assert_eq!(pool.idle_count(), 1);

    pool.shutdown().await;

    assert!(pool.is_shutdown());
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.total_count(), 0);

    for state in manager.connection_states() {
        assert!(state.is_terminated());
    }

    // The holder's next use fails instead of touching a dead session
    let err = held.connection().await.unwrap_err();
    assert!(err.is_shutdown());

    // Releasing after shutdown is a bookkeeping no-op
    pool.release(&held).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent() {
    let pool = ConnectionPool::connect(test_config(2, 5), MockManager::new())
        .await
        .unwrap();

    pool.shutdown().await;
    pool.shutdown().await;

    assert!(pool.is_shutdown());
    assert_eq!(pool.total_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_after_shutdown_fails() {
    let pool = ConnectionPool::connect(test_config(1, 1), MockManager::new())
        .await
        .unwrap();
    pool.shutdown().await;

    let err = pool.acquire(None).await.unwrap_err();
    assert!(matches!(err, PoolError::Shutdown));

    let err = pool.acquire(Some(Duration::from_secs(5))).await.unwrap_err();
    assert!(matches!(err, PoolError::Shutdown));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_wakes_blocked_acquirers() {
    let pool = ConnectionPool::connect(test_config(1, 1), MockManager::new())
        .await
        .unwrap();
    let _held = pool.acquire(None).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire(Some(Duration::from_secs(60))).await })
    };

    // Let the waiter park on the pool before shutting down
    tokio::time::sleep(Duration::from_millis(10)).await;
    let before = tokio::time::Instant::now();
    pool.shutdown().await;

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(PoolError::Shutdown)));
    // Failed fast rather than waiting out the 60s budget
    assert!(before.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_construction_failure_leaves_no_pool() {
    let manager = Arc::new(MockManager::new());
    manager.succeed_times(1);
    manager.fail_times(1);

    let err = ConnectionPool::connect(test_config(2, 5), Arc::clone(&manager))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ConnectionCreation(_)));

    // The connection created before the failure was torn down again
    let states = manager.connection_states();
    assert_eq!(states.len(), 1);
    assert!(states[0].is_terminated());
}
