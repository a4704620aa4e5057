//! `kluster-messaging`: asynchronous messaging between modules.
//!
//! Modules publish typed contracts through a [`Publisher`]; the [`BusHost`]
//! routes each [`MessageEnvelope`] to the consumers registered for its type.
//! Transport lives behind [`MessageBus`] (in-memory here, Redis in infra).

pub mod bus;
pub mod consumer;
pub mod envelope;
pub mod host;
pub mod in_memory_bus;
pub mod message;
pub mod publisher;

pub use bus::{BusError, MessageBus, Subscription};
pub use consumer::{ConsumeContext, ConsumeError, Consumer, ConsumerRegistry, RegistryError, endpoint_name};
pub use envelope::MessageEnvelope;
pub use host::{BusHost, BusHostHandle};
pub use in_memory_bus::InMemoryMessageBus;
pub use message::{InvoiceCreated, Message, OtpRequested, PaymentCompleted, UserRegistered};
pub use publisher::Publisher;
