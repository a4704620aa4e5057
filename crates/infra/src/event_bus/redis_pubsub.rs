//! Redis pub/sub message bus.
//!
//! Pub/sub is not durable: messages published while no subscriber is
//! connected are dropped. Consumers already tolerate at-least-once delivery,
//! and the mail jobs they enqueue are persisted by the job store.

use std::thread;

use redis::Commands;
use tokio::sync::mpsc;

use kluster_messaging::{BusError, MessageBus, MessageEnvelope, Subscription};

/// Redis pub/sub bus for message envelopes, one channel per deployment.
#[derive(Debug, Clone)]
pub struct RedisPubSubMessageBus {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubMessageBus {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| BusError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl MessageBus<MessageEnvelope> for RedisPubSubMessageBus {
    fn publish(&self, message: MessageEnvelope) -> Result<(), BusError> {
        let payload = serde_json::to_string(&message)?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| BusError::Transport(e.to_string()))?;

        let _: i64 = conn
            .publish(&self.channel, payload)
            .map_err(|e| BusError::Transport(e.to_string()))?;

        Ok(())
    }

    fn subscribe(&self) -> Subscription<MessageEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // The redis pub/sub connection is blocking, so it gets its own thread.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(err) => {
                    tracing::error!(error = %err, "redis subscriber could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(err) = pubsub.subscribe(&channel) {
                tracing::error!(channel = %channel, error = %err, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!(error = %err, "redis subscription ended");
                        return;
                    }
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let envelope: MessageEnvelope = match serde_json::from_str(&payload) {
                    Ok(e) => e,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping undecodable envelope");
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

    #[test]
    fn rejects_malformed_urls() {
        assert!(matches!(
            RedisPubSubMessageBus::new("not a url", "kluster"),
            Err(BusError::Transport(_))
        ));
        let bus = RedisPubSubMessageBus::new("redis://127.0.0.1:6379", "kluster").unwrap();
        assert_eq!(bus.channel(), "kluster");
    }
}
