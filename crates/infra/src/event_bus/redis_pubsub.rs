//! Redis pub/sub-backed event bus (optional).
//!
//! Redis pub/sub is not durable: subscribers that are offline miss messages.
//! The ledger remains the source of truth, so consumers that need every
//! transaction reconcile against it.

use std::fmt;
use std::sync::{Arc, mpsc};
use std::thread;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use stockledger_events::{EventBus, EventEnvelope, Subscription};

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(String),
    #[error("failed to serialize envelope: {0}")]
    Serialize(String),
}

/// Redis pub/sub bus carrying JSON-encoded event envelopes on one channel.
///
/// Publishes share one multiplexed connection, opened on first use and shared
/// by clones. A failed connect is not cached; the next publish retries.
#[derive(Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
    channel: String,
    connection: Arc<OnceCell<MultiplexedConnection>>,
}

impl fmt::Debug for RedisPubSubEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisPubSubEventBus")
            .field("channel", &self.channel)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl RedisPubSubEventBus {
    /// Parse the address; no connection is made until the first publish.
    pub fn new(
        redis_url: impl AsRef<str>,
        channel: impl Into<String>,
    ) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
            connection: Arc::new(OnceCell::new()),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn connection(&self) -> Result<MultiplexedConnection, RedisBusError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                debug!(channel = %self.channel, "opening redis publish connection");
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| RedisBusError::Redis(e.to_string()))
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl<E> EventBus<EventEnvelope<E>> for RedisPubSubEventBus
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Error = RedisBusError;

    async fn publish(&self, message: EventEnvelope<E>) -> Result<(), Self::Error> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| RedisBusError::Serialize(e.to_string()))?;

        let mut conn = self.connection().await?;

        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        debug!(
            channel = %self.channel,
            message_id = %message.id(),
            receivers,
            "published event"
        );
        Ok(())
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<E>> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Background thread that receives pub/sub messages and forwards them.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "redis subscription could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if pubsub.subscribe(&channel).is_err() {
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let envelope: EventEnvelope<E> = match serde_json::from_str(&payload) {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "dropping undecodable message");
                        continue;
                    }
                };

                if tx.send(envelope).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn rejects_malformed_address() {
        let err = RedisPubSubEventBus::new("not a url", "ch").unwrap_err();
        assert!(matches!(err, RedisBusError::Redis(_)));
    }

    #[test]
    fn parses_address_without_connecting() {
        let bus = RedisPubSubEventBus::new("redis://127.0.0.1:1/", "stock").unwrap();
        assert_eq!(bus.channel(), "stock");
        assert!(!bus.connection.initialized());
    }

    #[tokio::test]
    async fn failed_connect_is_not_cached() {
        let bus = RedisPubSubEventBus::new("redis://127.0.0.1:1/", "stock").unwrap();
        let clone = bus.clone();

        for _ in 0..2 {
            let envelope =
                EventEnvelope::new(Uuid::now_v7(), "test", "test.Ping", 1, Utc::now(), 7u32);
            let err = bus.publish(envelope).await.unwrap_err();
            assert!(matches!(err, RedisBusError::Redis(_)));
        }

        assert!(!bus.connection.initialized());
        assert!(Arc::ptr_eq(&bus.connection, &clone.connection));
    }
}
