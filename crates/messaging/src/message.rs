//! Message contracts exchanged between modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use kluster_core::{ClientId, InvoiceId, Money, PaymentId, UserId};

/// A typed message that can travel over the bus.
pub trait Message: Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type name used to route envelopes to consumers.
    const MESSAGE_TYPE: &'static str;
}

/// A user account was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

impl Message for UserRegistered {
    const MESSAGE_TYPE: &'static str = "users.user_registered";
}

/// A one-time password was issued and must be mailed to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRequested {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub otp: String,
}

impl Message for OtpRequested {
    const MESSAGE_TYPE: &'static str = "users.otp_requested";
}

/// An invoice was issued to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub business_id: UserId,
    pub client_id: ClientId,
    pub client_email: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub total: Money,
    pub due_date: DateTime<Utc>,
}

impl Message for InvoiceCreated {
    const MESSAGE_TYPE: &'static str = "business.invoice_created";
}

/// A payment for an invoice was verified with the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub business_id: UserId,
    pub reference: String,
    pub amount: Money,
    pub email: String,
}

impl Message for PaymentCompleted {
    const MESSAGE_TYPE: &'static str = "payments.payment_completed";
}
