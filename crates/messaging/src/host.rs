//! Background host that feeds bus envelopes to registered consumers.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::{MessageBus, Subscription};
use crate::consumer::ConsumerRegistry;
use crate::envelope::MessageEnvelope;

/// Owns the consumer registry and runs the dispatch loop.
pub struct BusHost {
    registry: Arc<ConsumerRegistry>,
}

/// Handle to a running host. Dropping it does not stop the loop; call
/// [`BusHostHandle::shutdown`].
#[derive(Debug)]
pub struct BusHostHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BusHostHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "bus host task ended abnormally");
        }
    }
}

impl BusHost {
    pub fn new(registry: ConsumerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Deliver one envelope to every consumer of its type.
    ///
    /// Returns how many consumers handled it successfully. Failures are logged
    /// and never abort delivery to the remaining consumers.
    pub async fn dispatch(&self, envelope: &MessageEnvelope) -> usize {
        dispatch(&self.registry, envelope).await
    }

    /// Subscribe to `bus` and dispatch in a background task.
    pub fn start(self, bus: &dyn MessageBus<MessageEnvelope>) -> BusHostHandle {
        let subscription = bus.subscribe();
        let (tx, rx) = watch::channel(false);
        let registry = self.registry;

        let task = tokio::spawn(run(registry, subscription, rx));
        BusHostHandle { shutdown: tx, task }
    }
}

async fn run(
    registry: Arc<ConsumerRegistry>,
    mut subscription: Subscription<MessageEnvelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(endpoints = ?registry.endpoints().collect::<Vec<_>>(), "bus host started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = subscription.recv() => {
                let Some(envelope) = next else { break };
                dispatch(&registry, &envelope).await;
            }
        }
    }

    tracing::info!("bus host stopped");
}

async fn dispatch(registry: &ConsumerRegistry, envelope: &MessageEnvelope) -> usize {
    let handlers = registry.handlers_for(envelope.message_type());
    if handlers.is_empty() {
        tracing::trace!(message_type = envelope.message_type(), "no consumers for message");
        return 0;
    }

    let mut handled = 0;
    for registration in handlers {
        match registration.handle(envelope).await {
            Ok(()) => handled += 1,
            Err(err) => tracing::error!(
                endpoint = %registration.endpoint,
                message_type = envelope.message_type(),
                message_id = %envelope.message_id(),
                error = %err,
                "consumer failed"
            ),
        }
    }
    handled
}

impl core::fmt::Debug for BusHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusHost").field("registry", &self.registry).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::consumer::{ConsumeContext, ConsumeError, Consumer};
    use crate::in_memory_bus::InMemoryMessageBus;
    use crate::message::{Message, OtpRequested};
    use crate::publisher::Publisher;
    use kluster_core::UserId;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Consumer<OtpRequested> for Recorder {
        async fn consume(&self, message: OtpRequested, _: &ConsumeContext) -> Result<(), ConsumeError> {
            self.seen.lock().unwrap().push(message.otp);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Consumer<OtpRequested> for Failing {
        async fn consume(&self, _: OtpRequested, _: &ConsumeContext) -> Result<(), ConsumeError> {
            Err(ConsumeError::handler("boom"))
        }
    }

    fn otp(code: &str) -> OtpRequested {
        OtpRequested {
            user_id: UserId::new(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            otp: code.into(),
        }
    }

    #[tokio::test]
    async fn failing_consumer_does_not_block_others() {
        let recorder = Recorder::default();
        let mut registry = ConsumerRegistry::new();
        registry.register::<OtpRequested, _>(Failing).unwrap();
        registry.register::<OtpRequested, _>(recorder.clone()).unwrap();
        let host = BusHost::new(registry);

        let envelope = MessageEnvelope::wrap(&otp("123456"), None).unwrap();
        assert_eq!(host.dispatch(&envelope).await, 1);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), ["123456"]);
    }

    #[tokio::test]
    async fn unknown_message_types_are_skipped() {
        let host = BusHost::new(ConsumerRegistry::new());
        let envelope = MessageEnvelope::new("nobody.cares", None, serde_json::json!({}));
        assert_eq!(host.dispatch(&envelope).await, 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_as_failure() {
        let recorder = Recorder::default();
        let mut registry = ConsumerRegistry::new();
        registry.register::<OtpRequested, _>(recorder.clone()).unwrap();
        let host = BusHost::new(registry);

        let envelope = MessageEnvelope::new(OtpRequested::MESSAGE_TYPE, None, serde_json::json!({"otp": 1}));
        assert_eq!(host.dispatch(&envelope).await, 0);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn started_host_consumes_published_messages() {
        let bus: Arc<InMemoryMessageBus<MessageEnvelope>> = Arc::new(InMemoryMessageBus::new());
        let recorder = Recorder::default();
        let mut registry = ConsumerRegistry::new();
        registry.register::<OtpRequested, _>(recorder.clone()).unwrap();

        let handle = BusHost::new(registry).start(bus.as_ref());
        let publisher = Publisher::new(bus.clone());
        publisher.publish(&otp("654321")).unwrap();

        for _ in 0..50 {
            if !recorder.seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(recorder.seen.lock().unwrap().as_slice(), ["654321"]);
    }
}
