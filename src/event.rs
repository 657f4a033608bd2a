//! Invalidation event record exchanged between processes.
//!
//! Events travel over the invalidation bus as JSON. They are never persisted;
//! a missed event is recovered naturally the next time the remote store is
//! consulted.

use serde::{Deserialize, Serialize};

/// A cross-process eviction notice.
///
/// `key: None` means "clear every entry of this cache". The `sender` field is
/// compared against the local process id on every inbound event so a process
/// never reacts to its own publications (loop avoidance is explicit, not
/// delegated to the transport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Name of the cache the event applies to.
    pub cache: String,
    /// Id of the publishing process.
    pub sender: String,
    /// Entry to evict, or `None` for a whole-cache clear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl InvalidationEvent {
    pub fn entry(cache: impl Into<String>, sender: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cache: cache.into(),
            sender: sender.into(),
            key: Some(key.into()),
        }
    }

    pub fn clear_all(cache: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            cache: cache.into(),
            sender: sender.into(),
            key: None,
        }
    }

    #[must_use]
    pub fn is_clear_all(&self) -> bool {
        self.key.is_none()
    }
}
