use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Transport unit carried by the bus.
///
/// The payload stays as JSON until a consumer for `message_type` decodes it,
/// so the bus never needs to know the concrete contract types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    message_id: Uuid,
    message_type: String,
    correlation_id: Option<Uuid>,
    sent_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl MessageEnvelope {
    pub fn new(
        message_type: impl Into<String>,
        correlation_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            message_type: message_type.into(),
            correlation_id,
            sent_at: Utc::now(),
            payload,
        }
    }

    /// Serialize a typed message into an envelope.
    pub fn wrap<M: Message>(message: &M, correlation_id: Option<Uuid>) -> Result<Self, serde_json::Error> {
        Ok(Self::new(M::MESSAGE_TYPE, correlation_id, serde_json::to_value(message)?))
    }

    /// Decode the payload as `M`.
    pub fn decode<M: Message>(&self) -> Result<M, serde_json::Error> {
        M::deserialize(&self.payload)
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
