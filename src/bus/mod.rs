// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Invalidation bus: best-effort pub/sub propagation of eviction events.
//!
//! Each process publishes eviction/clear events on a named topic and applies
//! events from sibling processes to its own local store only. Delivery runs
//! on the bus's own task and must not assume mutual exclusion with foreground
//! calls; handlers only touch thread-safe local store operations.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::InvalidationEvent;

/// Callback invoked for every event delivered on a subscribed topic.
pub type EventHandler = Arc<dyn Fn(InvalidationEvent) + Send + Sync>;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("bus backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait InvalidationBus: Send + Sync {
    /// Publish an event on a topic. Best effort: the caller treats a failure
    /// as lost coherence, not as an operation failure.
    async fn publish(&self, topic: &str, event: &InvalidationEvent) -> Result<(), BusError>;

    /// Register a handler for every event subsequently published on `topic`.
    /// Delivery happens on the bus's own task.
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError>;
}
