//! In-memory remote store.
//!
//! Stand-in for Redis when a shared backend is not configured, and the
//! workhorse of the test suite: one instance shared by several managers
//! behaves like one Redis shared by several processes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{RemoteStore, StorageError};

#[derive(Debug, Clone)]
struct Stored {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Stored {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct InMemoryRemoteStore {
    data: DashMap<String, Stored>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Current live entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| e.is_live(now)).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Instant::now();
        match self.data.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.value.clone())),
            Some(stored) => {
                // Release the shard read guard before remove_if takes the
                // write lock, or the same-shard upgrade deadlocks.
                drop(stored);
                drop(self.data.remove_if(key, |_, stored| !stored.is_live(now)));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StorageError> {
        self.data.insert(
            key.to_string(),
            Stored {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Instant::now();
        let mut previous = None;

        self.data
            .entry(key.to_string())
            .and_modify(|stored| {
                if stored.is_live(now) {
                    previous = Some(stored.value.clone());
                } else {
                    *stored = Stored {
                        value: value.to_vec(),
                        expires_at: now + ttl,
                    };
                }
            })
            .or_insert_with(|| Stored {
                value: value.to_vec(),
                expires_at: now + ttl,
            });

        Ok(previous)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<(), StorageError> {
        self.data.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
