// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis remote store backend.
//!
//! Plain STRING storage with per-key TTL (`SET ... PX`), `SET ... NX` for
//! atomic put-if-absent and SCAN-based prefix deletion for whole-cache
//! clears. No retries on individual operations: runtime failures feed the
//! circuit breaker.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, pipe, AsyncCommands, Client};

use super::traits::{RemoteStore, StorageError};
use crate::resilience::retry::{retry, RetryConfig};

pub struct RedisRemoteStore {
    connection: ConnectionManager,
    /// Optional key prefix for namespacing (e.g., "myapp:" → "myapp:users::alice")
    prefix: String,
}

impl RedisRemoteStore {
    /// Create a new Redis store without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        Self::with_prefix(connection_string, None).await
    }

    /// Create a new Redis store with an optional key prefix.
    ///
    /// The prefix is prepended to all keys, enabling namespacing when sharing
    /// a Redis instance with other applications.
    pub async fn with_prefix(
        connection_string: &str,
        prefix: Option<&str>,
    ) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // Startup config: fast-fail after a few seconds, don't hang forever.
        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Get a clone of the connection manager (for sharing with the bus).
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.connection.clone();
        let key = self.prefixed_key(key);

        let value: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let key = self.prefixed_key(key);

        let _: () = cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.connection.clone();
        let key = self.prefixed_key(key);

        let set: Option<String> = cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if set.is_some() {
            return Ok(None);
        }

        // The key was already set; fetch the winning value. If it expired in
        // between, the outcome is equivalent to our write having won.
        let existing: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(existing)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let key = self.prefixed_key(key);

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.prefixed_key(prefix));

        // SCAN instead of KEYS to avoid blocking Redis.
        let mut keys: Vec<String> = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (new_cursor, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            keys.extend(batch);
            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        for chunk in keys.chunks(128) {
            let mut pipeline = pipe();
            for key in chunk {
                pipeline.del(key);
            }
            pipeline
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}
