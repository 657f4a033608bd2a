// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-name cache coordinator: the two-tier get/put/evict/invalidate protocol.
//!
//! Reads prefer the local store and fall back to the remote store through the
//! circuit breaker; mutations hit the local store synchronously and the remote
//! store best-effort, publishing invalidation events so sibling processes drop
//! their stale local copies. Infrastructure failure never reaches the caller:
//! a broken remote degrades every operation to local-only behavior.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::bus::InvalidationBus;
use crate::error::{BoxError, CacheError};
use crate::event::InvalidationEvent;
use crate::local::LocalStore;
use crate::locks::{LockKey, LockTable};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::storage::traits::RemoteStore;

/// Loader returned no value; surfaced to the caller as a retrieval error.
#[derive(Debug)]
struct EmptyLoad;

impl fmt::Display for EmptyLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("loader produced no value")
    }
}

impl std::error::Error for EmptyLoad {}

/// One named cache spanning the local and remote tiers.
///
/// Created by the [`CacheManager`](crate::CacheManager); all instances of a
/// process share the remote store, the bus, and the circuit breaker.
pub struct MultiLevelCache {
    name: String,
    sender_id: String,
    topic: String,
    remote_ttl: Duration,
    local: LocalStore,
    locks: LockTable,
    remote: Arc<dyn RemoteStore>,
    bus: Arc<dyn InvalidationBus>,
    breaker: Arc<CircuitBreaker>,
    /// Serializes every `get` on this instance so concurrent callers share one
    /// loader invocation. Whole-instance, so unrelated keys queue behind each
    /// other too.
    load_guard: Mutex<()>,
}

impl MultiLevelCache {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        sender_id: String,
        topic: String,
        remote_ttl: Duration,
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        bus: Arc<dyn InvalidationBus>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            name,
            sender_id,
            topic,
            remote_ttl,
            local,
            locks: LockTable::new(),
            remote,
            bus,
            breaker,
            load_guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current local entry count.
    #[must_use]
    pub fn local_size(&self) -> usize {
        self.local.estimated_size()
    }

    /// Namespace a caller key into the shared remote key space.
    fn remote_key(&self, key: &str) -> String {
        format!("{}::{}", self.name, key)
    }

    fn remote_prefix(&self) -> String {
        format!("{}::", self.name)
    }

    /// Read a key from the fastest tier that has it.
    ///
    /// A remote hit is mirrored into the local store. Remote failure or an
    /// open breaker degrades to "absent" without touching the local store.
    pub async fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(value) = self.local.get(key) {
            crate::metrics::record_lookup(&self.name, "local", "hit");
            return Some(value);
        }
        crate::metrics::record_lookup(&self.name, "local", "miss");

        let remote_key = self.remote_key(key);
        match self.breaker.call(|| self.remote.get(&remote_key)).await {
            Ok(Some(value)) => {
                crate::metrics::record_lookup(&self.name, "remote", "hit");
                self.local.put(key, value.clone());
                Some(value)
            }
            Ok(None) => {
                crate::metrics::record_lookup(&self.name, "remote", "miss");
                None
            }
            Err(e) => {
                trace!(cache = %self.name, key, error = %e, "remote lookup unavailable");
                crate::metrics::record_lookup(&self.name, "remote", "failure");
                None
            }
        }
    }

    /// Read a key, computing and caching the value on a miss.
    ///
    /// All `get` calls on this instance are serialized, so under concurrency
    /// the loader runs at most once per miss. A loader error, or a loader
    /// returning `Ok(None)`, surfaces as [`CacheError::Retrieval`] and leaves
    /// the key unpopulated.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>, BoxError>>,
    {
        let _flight = self.load_guard.lock().await;
        crate::metrics::record_operation(&self.name, "get");

        if let Some(value) = self.local.get(key) {
            crate::metrics::record_lookup(&self.name, "local", "hit");
            return Ok(value);
        }
        crate::metrics::record_lookup(&self.name, "local", "miss");

        let remote_key = self.remote_key(key);
        match self.breaker.call(|| self.remote.get(&remote_key)).await {
            Ok(Some(value)) => {
                crate::metrics::record_lookup(&self.name, "remote", "hit");
                self.local.put(key, value.clone());
                Ok(value)
            }
            Ok(None) => {
                crate::metrics::record_lookup(&self.name, "remote", "miss");
                let value = run_loader(key, loader).await?;

                // A concurrent writer in another process may have filled the
                // key between our read and this write; their value wins.
                let stored = match self
                    .breaker
                    .call(|| self.remote.put_if_absent(&remote_key, &value, self.remote_ttl))
                    .await
                {
                    Ok(Some(existing)) => existing,
                    Ok(None) => value,
                    Err(e) => {
                        debug!(cache = %self.name, key, error = %e, "remote write unavailable, caching locally only");
                        value
                    }
                };
                self.local.put(key, stored.clone());
                Ok(stored)
            }
            Err(e) => {
                debug!(cache = %self.name, key, error = %e, "remote unavailable, loading locally");
                crate::metrics::record_lookup(&self.name, "remote", "failure");
                let value = run_loader(key, loader).await?;
                self.local.put(key, value.clone());
                Ok(value)
            }
        }
    }

    /// Write a value to both tiers. `None` behaves as [`evict`](Self::evict).
    ///
    /// The local write is synchronous and always visible to subsequent local
    /// reads; the remote write is best effort. No event is published - the
    /// remote store is the point of convergence for sibling processes.
    pub async fn put(&self, key: &str, value: Option<&[u8]>) {
        let Some(value) = value else {
            self.evict(key).await;
            return;
        };
        crate::metrics::record_operation(&self.name, "put");

        self.local.put(key, value.to_vec());
        crate::metrics::set_local_entries(&self.name, self.local.estimated_size());

        let remote_key = self.remote_key(key);
        if let Err(e) = self
            .breaker
            .call(|| self.remote.put(&remote_key, value, self.remote_ttl))
            .await
        {
            debug!(cache = %self.name, key, error = %e, "remote put skipped");
        }
    }

    /// Write a value only if the key is absent from both tiers.
    ///
    /// Returns the pre-existing value if there was one, `None` when the write
    /// happened. `None` input behaves as `evict` and returns `None`.
    pub async fn put_if_absent(&self, key: &str, value: Option<&[u8]>) -> Option<Vec<u8>> {
        let Some(value) = value else {
            self.evict(key).await;
            return None;
        };
        crate::metrics::record_operation(&self.name, "put_if_absent");

        let lock = self.locks.acquire(LockKey::Entry(key.to_string()));
        let _guard = lock.lock().await;

        if let Some(existing) = self.lookup(key).await {
            return Some(existing);
        }

        self.local.put(key, value.to_vec());
        let remote_key = self.remote_key(key);
        match self
            .breaker
            .call(|| self.remote.put_if_absent(&remote_key, value, self.remote_ttl))
            .await
        {
            // Lost a race against another process: adopt their value.
            Ok(Some(existing)) => {
                self.local.put(key, existing.clone());
                Some(existing)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(cache = %self.name, key, error = %e, "remote put_if_absent skipped");
                None
            }
        }
    }

    /// Remove a key from both tiers and notify sibling processes.
    pub async fn evict(&self, key: &str) {
        crate::metrics::record_operation(&self.name, "evict");
        self.local.invalidate(key);

        let remote_key = self.remote_key(key);
        if let Err(e) = self.breaker.call(|| self.remote.remove(&remote_key)).await {
            debug!(cache = %self.name, key, error = %e, "remote evict skipped");
        }

        self.publish(Some(key)).await;
    }

    /// [`evict`](Self::evict) under the per-key lock, reporting whether the
    /// local store held the key.
    pub async fn evict_if_present(&self, key: &str) -> bool {
        let lock = self.locks.acquire(LockKey::Entry(key.to_string()));
        let _guard = lock.lock().await;

        let was_present = self.local.contains(key);
        self.evict(key).await;
        was_present
    }

    /// Drop every entry of this cache from both tiers and notify siblings.
    pub async fn clear(&self) {
        crate::metrics::record_operation(&self.name, "clear");
        self.local.invalidate_all();
        crate::metrics::set_local_entries(&self.name, 0);

        let prefix = self.remote_prefix();
        if let Err(e) = self.breaker.call(|| self.remote.clear(&prefix)).await {
            debug!(cache = %self.name, error = %e, "remote clear skipped");
        }

        self.publish(None).await;
    }

    /// [`clear`](Self::clear) under the cache-wide lock, reporting whether the
    /// local store held anything.
    pub async fn invalidate(&self) -> bool {
        let lock = self.locks.acquire(LockKey::CacheWide);
        let _guard = lock.lock().await;

        let had_entries = self.local.estimated_size() > 0;
        self.clear().await;
        had_entries
    }

    /// Fire-and-forget invalidation publish; a lost event costs coherence
    /// until the next remote read, never correctness of this process.
    async fn publish(&self, key: Option<&str>) {
        let event = match key {
            Some(key) => InvalidationEvent::entry(&self.name, &self.sender_id, key),
            None => InvalidationEvent::clear_all(&self.name, &self.sender_id),
        };
        crate::metrics::record_invalidation(&self.name, "published");

        if let Err(e) = self
            .breaker
            .call(|| self.bus.publish(&self.topic, &event))
            .await
        {
            warn!(cache = %self.name, error = %e, "invalidation publish failed");
        }
    }

    /// Apply an event that arrived over the invalidation bus.
    ///
    /// Own publications are ignored by sender id. Events touch the local store
    /// only and are never republished; the remote store was already mutated by
    /// the originating process.
    pub fn apply_remote_event(&self, event: &InvalidationEvent) {
        if event.sender == self.sender_id {
            return;
        }
        debug_assert_eq!(event.cache, self.name);

        match &event.key {
            Some(key) => self.local.invalidate(key),
            None => self.local.invalidate_all(),
        }
        crate::metrics::record_invalidation(&self.name, "applied");
        trace!(
            cache = %self.name,
            sender = %event.sender,
            clear_all = event.is_clear_all(),
            "applied remote invalidation"
        );
    }
}

async fn run_loader<F, Fut>(key: &str, loader: F) -> Result<Vec<u8>, CacheError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<Vec<u8>>, BoxError>>,
{
    match loader().await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(CacheError::retrieval(key, Box::new(EmptyLoad))),
        Err(e) => Err(CacheError::retrieval(key, e)),
    }
}
