// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis pub/sub invalidation bus.
//!
//! Publishing rides the shared connection manager; the subscription runs on
//! its own task with a dedicated pub/sub connection that reconnects forever
//! (daemon backoff) when the stream drops. Undecodable payloads are logged
//! and skipped - a malformed event must never take the subscriber down.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, warn};

use super::{BusError, EventHandler, InvalidationBus};
use crate::event::InvalidationEvent;
use crate::resilience::retry::{retry, RetryConfig};

pub struct RedisInvalidationBus {
    client: Client,
    connection: ConnectionManager,
}

impl RedisInvalidationBus {
    pub async fn new(connection_string: &str) -> Result<Self, BusError> {
        let client =
            Client::open(connection_string).map_err(|e| BusError::Backend(e.to_string()))?;

        let connection = retry("bus_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| BusError::Backend(e.to_string()))?;

        Ok(Self { client, connection })
    }

    /// Build from an existing client/connection pair (shared with the store).
    pub fn from_parts(client: Client, connection: ConnectionManager) -> Self {
        Self { client, connection }
    }
}

#[async_trait]
impl InvalidationBus for RedisInvalidationBus {
    async fn publish(&self, topic: &str, event: &InvalidationEvent) -> Result<(), BusError> {
        let payload =
            serde_json::to_string(event).map_err(|e| BusError::Backend(e.to_string()))?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .publish(topic, payload)
            .await
            .map_err(|e| BusError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<(), BusError> {
        let client = self.client.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            loop {
                let pubsub = retry("bus_subscribe", &RetryConfig::daemon(), || async {
                    let mut pubsub = client.get_async_pubsub().await?;
                    pubsub.subscribe(&topic).await?;
                    Ok::<_, redis::RedisError>(pubsub)
                })
                .await;

                // Daemon retry never gives up; the Err arm is unreachable but
                // the type demands it.
                let Ok(mut pubsub) = pubsub else { continue };
                debug!(topic = %topic, "invalidation subscription established");

                let mut stream = pubsub.on_message();
                while let Some(message) = stream.next().await {
                    let payload: String = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "unreadable bus payload, skipping");
                            continue;
                        }
                    };
                    match serde_json::from_str::<InvalidationEvent>(&payload) {
                        Ok(event) => handler(event),
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "undecodable invalidation event, skipping");
                        }
                    }
                }

                warn!(topic = %topic, "invalidation subscription lost, reconnecting");
            }
        });

        Ok(())
    }
}
