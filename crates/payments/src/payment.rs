use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kluster_core::{Entity, InvoiceId, Money, OwnedEntity, PaymentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Initialized,
    Successful,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Initialized => "Initialized",
            PaymentStatus::Successful => "Successful",
            PaymentStatus::Failed => "Failed",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initialized" => Ok(PaymentStatus::Initialized),
            "Successful" => Ok(PaymentStatus::Successful),
            "Failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// One attempt to settle an invoice through the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub business_id: UserId,
    /// Unique across all payments; shared with the gateway.
    pub reference: String,
    pub amount: Money,
    pub email: String,
    pub status: PaymentStatus,
    pub authorization_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new_reference() -> String {
        format!("KLS-{}", uuid::Uuid::new_v4().simple())
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &PaymentId {
        &self.id
    }
}

impl OwnedEntity for Payment {
    fn owner_id(&self) -> &UserId {
        &self.business_id
    }
}
