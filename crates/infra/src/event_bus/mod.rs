//! Broker-backed [`MessageBus`](kluster_messaging::MessageBus) transports.
//!
//! The in-memory bus in `kluster-messaging` covers single-process runs; this
//! module adds Redis pub/sub for deployments with a `MessageBroker` section.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisPubSubMessageBus;
