// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-key lock registry for compound cache operations.
//!
//! `put_if_absent`, `evict_if_present` and `invalidate` need check-then-act
//! atomicity against each other; this table hands out one async mutex per
//! contended key, created lazily and reclaimed when idle or over capacity.
//! Plain `put`/`evict`/`lookup` never touch it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

const LOCKS_MAX_SIZE: usize = 1000;
const LOCKS_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Key space of the lock table: one lock per cache key, plus a cache-wide
/// sentinel that can never collide with a real key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Entry(String),
    CacheWide,
}

struct LockSlot {
    lock: Arc<Mutex<()>>,
    last_used: Instant,
}

/// Bounded registry of reusable per-key locks.
pub struct LockTable {
    locks: DashMap<LockKey, LockSlot>,
    max_size: usize,
    idle_timeout: Duration,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(LOCKS_MAX_SIZE, LOCKS_IDLE_TIMEOUT)
    }

    #[must_use]
    pub fn with_limits(max_size: usize, idle_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            max_size,
            idle_timeout,
        }
    }

    /// Fetch the lock for `key`, creating it on first use.
    ///
    /// The caller holds the returned `Arc` for the duration of its critical
    /// section; a held lock is never reclaimed because its strong count stays
    /// above the table's own reference.
    pub fn acquire(&self, key: LockKey) -> Arc<Mutex<()>> {
        let lock = {
            let mut slot = self.locks.entry(key).or_insert_with(|| LockSlot {
                lock: Arc::new(Mutex::new(())),
                last_used: Instant::now(),
            });
            slot.last_used = Instant::now();
            slot.lock.clone()
        };

        self.reclaim();
        lock
    }

    /// Number of registered locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop idle locks, then the oldest unheld ones while over capacity.
    fn reclaim(&self) {
        let now = Instant::now();
        self.locks.retain(|_, slot| {
            Arc::strong_count(&slot.lock) > 1
                || now.saturating_duration_since(slot.last_used) < self.idle_timeout
        });

        if self.locks.len() <= self.max_size {
            return;
        }

        let mut unheld: Vec<(LockKey, Instant)> = self
            .locks
            .iter()
            .filter(|entry| Arc::strong_count(&entry.lock) == 1)
            .map(|entry| (entry.key().clone(), entry.last_used))
            .collect();
        unheld.sort_by_key(|(_, last_used)| *last_used);

        let excess = self.locks.len().saturating_sub(self.max_size);
        for (key, _) in unheld.into_iter().take(excess) {
            self.locks
                .remove_if(&key, |_, slot| Arc::strong_count(&slot.lock) == 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_returns_same_lock() {
        let table = LockTable::new();

        let first = table.acquire(LockKey::Entry("a".into()));
        let second = table.acquire(LockKey::Entry("a".into()));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_locks() {
        let table = LockTable::new();

        let a = table.acquire(LockKey::Entry("a".into()));
        let b = table.acquire(LockKey::Entry("b".into()));
        let wide = table.acquire(LockKey::CacheWide);

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &wide));
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_mutual_exclusion_on_same_key() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let table = Arc::new(LockTable::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let table = table.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let lock = table.acquire(LockKey::Entry("shared".into()));
                let _guard = lock.lock().await;
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                // No interleaving inside the critical section.
                assert_eq!(counter.load(Ordering::SeqCst), seen + 1);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn test_idle_locks_are_reclaimed() {
        let table = LockTable::with_limits(1000, Duration::from_millis(5));

        drop(table.acquire(LockKey::Entry("a".into())));
        assert_eq!(table.len(), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        // Reclaim runs on the next acquire.
        let _b = table.acquire(LockKey::Entry("b".into()));

        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_held_lock_survives_idle_reclaim() {
        let table = LockTable::with_limits(1000, Duration::from_millis(5));

        let held = table.acquire(LockKey::Entry("held".into()));
        let _guard = held.lock().await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let _other = table.acquire(LockKey::Entry("other".into()));

        assert_eq!(table.len(), 2, "held lock must not be reclaimed");
    }

    #[tokio::test]
    async fn test_capacity_bound_drops_oldest_unheld() {
        let table = LockTable::with_limits(4, Duration::from_secs(3600));

        for i in 0..8 {
            drop(table.acquire(LockKey::Entry(format!("k{i}"))));
        }

        assert!(table.len() <= 5, "table should stay near its bound, got {}", table.len());
    }
}
