//! Consumers and the registry that routes envelopes to them.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::envelope::MessageEnvelope;
use crate::message::Message;

/// Metadata about the envelope being consumed.
#[derive(Debug, Clone)]
pub struct ConsumeContext {
    pub message_id: Uuid,
    pub correlation_id: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
    pub endpoint: String,
}

#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("could not decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Handler(String),
}

impl ConsumeError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Handles one message contract.
#[async_trait]
pub trait Consumer<M: Message>: Send + Sync + 'static {
    async fn consume(&self, message: M, context: &ConsumeContext) -> Result<(), ConsumeError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("endpoint `{0}` is already registered")]
    DuplicateEndpoint(String),
}

/// Derive the endpoint name of a consumer from its type name.
///
/// `WelcomeMailConsumer` becomes `welcome-mail`.
pub fn endpoint_name(type_name: &str) -> String {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    let short = short.split('<').next().unwrap_or(short);
    let short = short.strip_suffix("Consumer").unwrap_or(short);

    let mut out = String::with_capacity(short.len() + 4);
    let mut prev_lower = false;
    for ch in short.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle(&self, envelope: &MessageEnvelope, context: &ConsumeContext) -> Result<(), ConsumeError>;
}

struct TypedHandler<M, C> {
    consumer: C,
    _message: core::marker::PhantomData<fn() -> M>,
}

#[async_trait]
impl<M, C> ErasedHandler for TypedHandler<M, C>
where
    M: Message,
    C: Consumer<M>,
{
    async fn handle(&self, envelope: &MessageEnvelope, context: &ConsumeContext) -> Result<(), ConsumeError> {
        let message: M = envelope.decode()?;
        self.consumer.consume(message, context).await
    }
}

pub(crate) struct Registration {
    pub(crate) endpoint: String,
    handler: Arc<dyn ErasedHandler>,
}

impl Registration {
    pub(crate) async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), ConsumeError> {
        let context = ConsumeContext {
            message_id: envelope.message_id(),
            correlation_id: envelope.correlation_id(),
            sent_at: envelope.sent_at(),
            endpoint: self.endpoint.clone(),
        };
        self.handler.handle(envelope, &context).await
    }
}

/// Consumers keyed by the message type they handle.
#[derive(Default)]
pub struct ConsumerRegistry {
    by_type: BTreeMap<&'static str, Vec<Registration>>,
    endpoints: HashSet<String>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `consumer` for `M` under an endpoint named after its type.
    pub fn register<M, C>(&mut self, consumer: C) -> Result<&mut Self, RegistryError>
    where
        M: Message,
        C: Consumer<M>,
    {
        let endpoint = endpoint_name(core::any::type_name::<C>());
        self.register_as::<M, C>(endpoint, consumer)
    }

    pub fn register_as<M, C>(&mut self, endpoint: impl Into<String>, consumer: C) -> Result<&mut Self, RegistryError>
    where
        M: Message,
        C: Consumer<M>,
    {
        let endpoint = endpoint.into();
        if !self.endpoints.insert(endpoint.clone()) {
            return Err(RegistryError::DuplicateEndpoint(endpoint));
        }

        let handler = TypedHandler::<M, C> {
            consumer,
            _message: core::marker::PhantomData,
        };
        self.by_type.entry(M::MESSAGE_TYPE).or_default().push(Registration {
            endpoint,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub(crate) fn handlers_for(&self, message_type: &str) -> &[Registration] {
        self.by_type.get(message_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.by_type.values().flatten().map(|r| r.endpoint.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl core::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UserRegistered;

    #[test]
    fn endpoint_names_are_kebab_case_without_suffix() {
        assert_eq!(endpoint_name("WelcomeMailConsumer"), "welcome-mail");
        assert_eq!(endpoint_name("kluster_notifications::consumers::OtpMailConsumer"), "otp-mail");
        assert_eq!(endpoint_name("InvoicePaidConsumer<Foo>"), "invoice-paid");
        assert_eq!(endpoint_name("Audit"), "audit");
    }

    struct Noop;

    #[async_trait]
    impl Consumer<UserRegistered> for Noop {
        async fn consume(&self, _: UserRegistered, _: &ConsumeContext) -> Result<(), ConsumeError> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_endpoints_are_rejected() {
        let mut registry = ConsumerRegistry::new();
        registry.register_as::<UserRegistered, _>("welcome-mail", Noop).unwrap();

        let err = registry.register_as::<UserRegistered, _>("welcome-mail", Noop).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateEndpoint("welcome-mail".into()));
    }

    #[test]
    fn registered_consumers_are_found_by_message_type() {
        let mut registry = ConsumerRegistry::new();
        registry.register::<UserRegistered, _>(Noop).unwrap();

        assert_eq!(registry.handlers_for(UserRegistered::MESSAGE_TYPE).len(), 1);
        assert!(registry.handlers_for("unknown").is_empty());
        assert_eq!(registry.endpoints().collect::<Vec<_>>(), vec!["noop"]);
    }
}
