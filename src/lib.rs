//! # Multi-Level Cache
//!
//! A two-tier cache coordinator for processes sharing a remote backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheManager                          │
//! │  • One coordinator per cache name (optional allow-list)    │
//! │  • Shared circuit breaker, expiry policy, sender identity  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Local Tier: LocalStore                     │
//! │  • DashMap, bounded, per-entry jittered expiry              │
//! │  • Synchronous reads and writes, LRU-style capacity bound   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   (through the circuit breaker)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Remote Tier: RemoteStore                    │
//! │  • Redis strings with per-key TTL, shared by all processes  │
//! │  • Failure degrades reads/writes to local-only behavior     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                      (pub/sub, best effort)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Invalidation Bus (Redis pub/sub)              │
//! │  • Evict/clear events fan out to sibling processes          │
//! │  • Sender-id filtering, local-store-only application        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use multilevel_cache::{
//!     CacheManager, MultiLevelCacheConfig, RedisInvalidationBus, RedisRemoteStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MultiLevelCacheConfig {
//!         cache_names: vec!["users".into()],
//!         ..Default::default()
//!     };
//!
//!     let remote = RedisRemoteStore::with_prefix(
//!         "redis://localhost:6379",
//!         config.effective_key_prefix(),
//!     )
//!     .await?;
//!     let bus = RedisInvalidationBus::new("redis://localhost:6379").await?;
//!
//!     let manager = CacheManager::new(config, Arc::new(remote), Arc::new(bus)).await?;
//!     let users = manager.get_cache("users").expect("allow-listed");
//!
//!     let value = users
//!         .get("user.42", || async {
//!             // Called only on a full miss, once per miss under concurrency.
//!             Ok(Some(b"loaded from the database".to_vec()))
//!         })
//!         .await?;
//!     println!("{} bytes", value.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Two Tiers**: process-local bounded store in front of a shared Redis
//! - **Coherence**: pub/sub invalidation with explicit sender-id filtering
//! - **Fail-Open**: circuit breaker degrades a broken remote to local-only
//! - **Jittered Expiry**: local deadlines randomized to desynchronize reloads
//! - **Single-Flight Loads**: concurrent `get` calls share one loader run
//!
//! ## Configuration
//!
//! See [`MultiLevelCacheConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`manager`]: The [`CacheManager`] registry
//! - [`cache`]: The per-name [`MultiLevelCache`] coordinator
//! - [`storage`]: Remote store backends (Redis, in-memory)
//! - [`bus`]: Invalidation bus (Redis pub/sub, in-memory)
//! - [`resilience`]: Circuit breaker and connection retry
//! - [`local`], [`expiry`], [`locks`]: the local tier and its policies

pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod expiry;
pub mod local;
pub mod locks;
pub mod manager;
pub mod metrics;
pub mod resilience;
pub mod storage;

pub use bus::memory::InMemoryBus;
pub use bus::redis::RedisInvalidationBus;
pub use bus::{BusError, EventHandler, InvalidationBus};
pub use cache::MultiLevelCache;
pub use config::{CircuitBreakerConfig, LocalCacheConfig, MultiLevelCacheConfig};
pub use error::{BoxError, CacheError, ConfigError};
pub use event::InvalidationEvent;
pub use expiry::{ExpirationMode, JitteredExpiry};
pub use local::LocalStore;
pub use locks::{LockKey, LockTable};
pub use manager::CacheManager;
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitError};
pub use resilience::retry::RetryConfig;
pub use storage::memory::InMemoryRemoteStore;
pub use storage::redis::RedisRemoteStore;
pub use storage::traits::{RemoteStore, StorageError};
