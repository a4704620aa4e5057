use std::sync::Arc;

use uuid::Uuid;

use crate::bus::{BusError, MessageBus};
use crate::envelope::MessageEnvelope;
use crate::message::Message;

/// Typed front door to the envelope bus.
///
/// Modules publish contracts through this and never see the transport.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus<MessageEnvelope>>,
}

impl Publisher {
    pub fn new(bus: Arc<dyn MessageBus<MessageEnvelope>>) -> Self {
        Self { bus }
    }

    pub fn publish<M: Message>(&self, message: &M) -> Result<(), BusError> {
        self.publish_correlated(message, None)
    }

    pub fn publish_correlated<M: Message>(
        &self,
        message: &M,
        correlation_id: Option<Uuid>,
    ) -> Result<(), BusError> {
        let envelope = MessageEnvelope::wrap(message, correlation_id)?;
        tracing::debug!(
            message_type = M::MESSAGE_TYPE,
            message_id = %envelope.message_id(),
            "publishing message"
        );
        self.bus.publish(envelope)
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus<MessageEnvelope>> {
        &self.bus
    }
}

impl core::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
