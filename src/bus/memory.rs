//! In-process invalidation bus.
//!
//! Fan-out over registered handlers, keyed by topic. Like the in-memory
//! remote store, one instance shared by several managers stands in for one
//! Redis pub/sub channel shared by several processes.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{BusError, EventHandler, InvalidationBus};
use crate::event::InvalidationEvent;

#[derive(Default)]
pub struct InMemoryBus {
    subscribers: DashMap<String, Vec<EventHandler>>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvalidationBus for InMemoryBus {
    async fn publish(&self, topic: &str, event: &InvalidationEvent) -> Result<(), BusError> {
        if let Some(handlers) = self.subscribers.get(topic) {
            for handler in handlers.iter() {
                handler(event.clone());
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError> {
        self.subscribers
            .entry(topic.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }
}
