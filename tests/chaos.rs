// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fault injection: a remote store that can be switched off mid-test.
//!
//! The coordinator must fail open - a dead remote degrades every operation
//! to local-only behavior, and the circuit breaker eventually stops paying
//! for the attempts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use multilevel_cache::{
    CacheManager, CircuitBreakerConfig, InMemoryBus, InMemoryRemoteStore, MultiLevelCacheConfig,
    RemoteStore, StorageError,
};

/// Remote store with a kill switch and an attempt counter.
struct FlakyRemoteStore {
    inner: InMemoryRemoteStore,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl FlakyRemoteStore {
    fn new() -> Self {
        Self {
            inner: InMemoryRemoteStore::new(),
            failing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Backend("injected fault".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StorageError> {
        self.check()?;
        self.inner.put(key, value, ttl).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.check()?;
        self.inner.put_if_absent(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn clear(&self, prefix: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.clear(prefix).await
    }
}

async fn manager_over(remote: Arc<FlakyRemoteStore>) -> Arc<CacheManager> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    CacheManager::new(
        MultiLevelCacheConfig::default(),
        remote,
        Arc::new(InMemoryBus::new()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn get_serves_the_loader_value_when_remote_is_down() {
    let remote = Arc::new(FlakyRemoteStore::new());
    remote.set_failing(true);
    let manager = manager_over(remote).await;
    let cache = manager.get_cache("users").unwrap();

    let value = cache
        .get("k", || async { Ok(Some(b"loaded".to_vec())) })
        .await
        .unwrap();

    assert_eq!(value, b"loaded");
    // And the value is served locally from now on.
    assert_eq!(cache.lookup("k").await, Some(b"loaded".to_vec()));
}

#[tokio::test]
async fn lookup_degrades_to_absent_without_erroring() {
    let remote = Arc::new(FlakyRemoteStore::new());
    let manager = manager_over(remote.clone()).await;
    let cache = manager.get_cache("users").unwrap();

    remote.set_failing(true);

    for _ in 0..10 {
        assert_eq!(cache.lookup("missing").await, None);
    }
}

#[tokio::test]
async fn mutations_survive_remote_failure_locally() {
    let remote = Arc::new(FlakyRemoteStore::new());
    let manager = manager_over(remote.clone()).await;
    let cache = manager.get_cache("users").unwrap();

    remote.set_failing(true);

    cache.put("a", Some(b"1")).await;
    assert_eq!(cache.lookup("a").await, Some(b"1".to_vec()));

    cache.evict("a").await;
    assert_eq!(cache.local_size(), 0);

    cache.put("b", Some(b"2")).await;
    assert!(cache.invalidate().await);
    assert_eq!(cache.local_size(), 0);
}

#[tokio::test]
async fn breaker_stops_paying_for_a_dead_remote() {
    let remote = Arc::new(FlakyRemoteStore::new());
    // Large slow-call duration keeps the derived window small (4 calls),
    // so the breaker opens quickly.
    let config = MultiLevelCacheConfig {
        circuit_breaker: CircuitBreakerConfig {
            slow_call_duration_ms: 2500,
            ..Default::default()
        },
        ..Default::default()
    };
    let manager = CacheManager::new(config, remote.clone(), Arc::new(InMemoryBus::new()))
        .await
        .unwrap();
    let cache = manager.get_cache("users").unwrap();

    remote.set_failing(true);

    // Fill the breaker window with failures.
    for _ in 0..8 {
        let _ = cache.lookup("missing").await;
    }

    let attempts_when_open = remote.attempts();
    for _ in 0..20 {
        assert_eq!(cache.lookup("missing").await, None);
    }

    assert_eq!(
        remote.attempts(),
        attempts_when_open,
        "an open breaker must reject without attempting the remote"
    );
}

#[tokio::test]
async fn consistent_local_view_after_the_remote_comes_back() {
    let remote = Arc::new(FlakyRemoteStore::new());
    let manager = manager_over(remote.clone()).await;
    let cache = manager.get_cache("users").unwrap();

    remote.set_failing(true);
    cache.put("k", Some(b"written-while-down")).await;

    remote.set_failing(false);

    // The local view kept the write; the remote never saw it.
    assert_eq!(cache.lookup("k").await, Some(b"written-while-down".to_vec()));
    assert_eq!(remote.inner.get("users::k").await.unwrap(), None);

    // The next write converges both tiers again.
    cache.put("k", Some(b"written-after-recovery")).await;
    assert_eq!(
        remote.inner.get("users::k").await.unwrap(),
        Some(b"written-after-recovery".to_vec())
    );
}
