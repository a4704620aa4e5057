//! `kluster-payments`: invoice payments through a hosted-checkout gateway
//! (Paystack in production).

pub mod dto;
pub mod errors;
pub mod gateway;
pub mod payment;
pub mod paystack;
pub mod repository;
pub mod service;

pub use gateway::{FakeGateway, GatewayError, InitializedTransaction, PaymentGateway, VerifiedTransaction};
pub use payment::{Payment, PaymentStatus};
pub use paystack::{PaystackClient, PaystackSettings};
pub use repository::{InMemoryPaymentRepository, PaymentRepository, PaymentRepositoryError};
pub use service::PaymentService;
