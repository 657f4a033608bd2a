// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Process-local bounded store.
//!
//! Thread-safe key/value map with a per-entry jittered expiry deadline and
//! capacity-based eviction. Reads and writes never take an external lock;
//! mutation comes from the coordinator and from invalidation bus callbacks,
//! which both go through the same thread-safe operations.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

use crate::expiry::{ExpirationMode, JitteredExpiry};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    deadline: Instant,
    last_access: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Bounded local cache tier.
///
/// Values are owned by the store; absence of a key is the only representation
/// of "no value". Expired entries are treated as absent by `get` and reclaimed
/// opportunistically during capacity enforcement.
pub struct LocalStore {
    entries: DashMap<String, Entry>,
    max_size: usize,
    expiry: Arc<JitteredExpiry>,
    mode: ExpirationMode,
}

impl LocalStore {
    pub fn new(max_size: usize, expiry: Arc<JitteredExpiry>, mode: ExpirationMode) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            expiry,
            mode,
        }
    }

    /// Look up a live entry. Expired entries are removed and reported absent.
    ///
    /// In `AfterRead` mode a successful read recomputes the deadline.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();

        let value = {
            let mut entry = self.entries.get_mut(key)?;
            if entry.is_expired(now) {
                None
            } else {
                entry.last_access = now;
                if self.mode == ExpirationMode::AfterRead {
                    entry.deadline = now + self.expiry.compute_ttl();
                }
                Some(entry.value.clone())
            }
        };

        if value.is_none() {
            // Reclaim, re-checking under the removal lock.
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        value
    }

    /// Whether a live entry exists, without touching access bookkeeping.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    /// Insert or replace a value.
    ///
    /// The deadline is computed by the expiry policy according to the
    /// configured mode: `AfterCreate` keeps the remaining time when a live
    /// entry is overwritten, the other modes recompute on every write.
    pub fn put(&self, key: &str, value: Vec<u8>) {
        let now = Instant::now();

        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let keep_deadline = self.mode == ExpirationMode::AfterCreate
                    && !occupied.get().is_expired(now);
                let deadline = if keep_deadline {
                    occupied.get().deadline
                } else {
                    now + self.expiry.compute_ttl()
                };
                occupied.insert(Entry {
                    value,
                    deadline,
                    last_access: now,
                });
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value,
                    deadline: now + self.expiry.compute_ttl(),
                    last_access: now,
                });
            }
        }

        self.enforce_capacity();
    }

    /// Remove a single entry.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Current entry count, expired entries included until reclaimed.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.entries.len()
    }

    /// Drop expired entries, then least-recently-accessed entries until the
    /// store fits its bound again.
    fn enforce_capacity(&self) {
        if self.entries.len() <= self.max_size {
            return;
        }

        let now = Instant::now();
        let mut candidates: Vec<(String, Instant)> = Vec::new();
        let mut expired: Vec<String> = Vec::new();

        for entry in self.entries.iter() {
            if entry.is_expired(now) {
                expired.push(entry.key().clone());
            } else {
                candidates.push((entry.key().clone(), entry.last_access));
            }
        }

        for key in &expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        let excess = self.entries.len().saturating_sub(self.max_size);
        if excess == 0 {
            return;
        }

        candidates.sort_by_key(|(_, last_access)| *last_access);
        let victims: Vec<_> = candidates.into_iter().take(excess).collect();
        for (key, _) in &victims {
            self.entries.remove(key);
        }
        debug!(
            reclaimed_expired = expired.len(),
            evicted = victims.len(),
            "local store over capacity"
        );
    }
}
