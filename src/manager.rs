// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache registry: one coordinator per name, shared infrastructure.
//!
//! The manager owns the process identity, the circuit breaker, the expiry
//! policy and the bus subscription; coordinators are created on demand (or
//! eagerly for allow-listed names) and cached for the life of the process.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::InvalidationBus;
use crate::cache::MultiLevelCache;
use crate::config::MultiLevelCacheConfig;
use crate::error::CacheError;
use crate::expiry::JitteredExpiry;
use crate::local::LocalStore;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::storage::traits::RemoteStore;

pub struct CacheManager {
    config: MultiLevelCacheConfig,
    remote: Arc<dyn RemoteStore>,
    bus: Arc<dyn InvalidationBus>,
    breaker: Arc<CircuitBreaker>,
    expiry: Arc<JitteredExpiry>,
    /// Process identity stamped on every published event; inbound events with
    /// this sender are dropped before they touch a local store.
    sender_id: String,
    caches: DashMap<String, Arc<MultiLevelCache>>,
    allowed: HashSet<String>,
}

impl CacheManager {
    /// Validate configuration, subscribe to the invalidation topic and build
    /// the registry.
    ///
    /// Fails fast on invalid expiry or breaker settings and on a subscription
    /// that cannot be established; nothing past construction returns
    /// configuration errors.
    pub async fn new(
        config: MultiLevelCacheConfig,
        remote: Arc<dyn RemoteStore>,
        bus: Arc<dyn InvalidationBus>,
    ) -> Result<Arc<Self>, CacheError> {
        let expiry = Arc::new(JitteredExpiry::new(
            config.time_to_live(),
            config.local.expiry_jitter,
            config.local.time_to_live(),
        )?);
        let breaker = Arc::new(CircuitBreaker::new("remote_store", &config.circuit_breaker)?);
        let sender_id = Uuid::new_v4().to_string();
        let allowed: HashSet<String> = config.cache_names.iter().cloned().collect();

        let manager = Arc::new(Self {
            config,
            remote,
            bus,
            breaker,
            expiry,
            sender_id,
            caches: DashMap::new(),
            allowed,
        });

        // The subscription holds a weak handle so a dropped manager does not
        // stay alive behind the bus task.
        let weak: Weak<Self> = Arc::downgrade(&manager);
        manager
            .bus
            .subscribe(
                &manager.config.topic,
                Arc::new(move |event| {
                    let Some(manager) = weak.upgrade() else { return };
                    if let Some(cache) = manager.caches.get(&event.cache) {
                        cache.apply_remote_event(&event);
                    };
                }),
            )
            .await?;

        for name in manager.config.cache_names.clone() {
            manager.create_cache(&name);
        }
        info!(
            sender_id = %manager.sender_id,
            topic = %manager.config.topic,
            caches = manager.caches.len(),
            "cache manager ready"
        );

        Ok(manager)
    }

    /// Fetch the coordinator for `name`, creating it on first use.
    ///
    /// Returns `None` when an allow-list is configured and `name` is not in
    /// it; with an empty allow-list any name is accepted.
    pub fn get_cache(&self, name: &str) -> Option<Arc<MultiLevelCache>> {
        if !self.allowed.is_empty() && !self.allowed.contains(name) {
            warn!(cache = %name, "cache name not in configured allow-list");
            return None;
        }
        Some(self.create_cache(name))
    }

    /// Names of every cache created so far.
    #[must_use]
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.iter().map(|e| e.key().clone()).collect()
    }

    /// Process identity used on published invalidation events.
    #[must_use]
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    fn create_cache(&self, name: &str) -> Arc<MultiLevelCache> {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(cache = %name, "creating cache coordinator");
                Arc::new(MultiLevelCache::new(
                    name.to_string(),
                    self.sender_id.clone(),
                    self.config.topic.clone(),
                    self.config.time_to_live(),
                    LocalStore::new(
                        self.config.local.max_size,
                        Arc::clone(&self.expiry),
                        self.config.local.expiration_mode,
                    ),
                    Arc::clone(&self.remote),
                    Arc::clone(&self.bus),
                    Arc::clone(&self.breaker),
                ))
            })
            .clone()
    }
}
