use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("remote backend error: {0}")]
    Backend(String),
}

/// Shared, durable key-value backend sitting behind the local tier.
///
/// Values are opaque bytes; keys arrive already namespaced by the coordinator
/// (`"{cache}::{key}"`). Every method may fail on network grounds - callers
/// route all invocations through the circuit breaker and treat failures as
/// "no value" / "no-op" outcomes.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a value with the given TTL, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StorageError>;

    /// Write a value only if the key is absent.
    ///
    /// Returns the pre-existing value when the write did not happen, `None`
    /// when the value was stored.
    async fn put_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key starting with `prefix` (one cache's namespace).
    async fn clear(&self, prefix: &str) -> Result<(), StorageError>;
}
