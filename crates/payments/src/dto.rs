use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use kluster_core::Money;
use kluster_core::validation::validate_email_address;

use crate::payment::Payment;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    #[validate(length(min = 1, code = "Required", message = "Invoice id is required."))]
    pub invoice_id: String,
    #[validate(custom(function = "validate_email_address"))]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentResponse {
    pub payment_id: String,
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub invoice_id: String,
    pub reference: String,
    pub amount: Money,
    pub email: String,
    pub status: String,
    pub authorization_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id.to_string(),
            invoice_id: p.invoice_id.to_string(),
            reference: p.reference.clone(),
            amount: p.amount,
            email: p.email.clone(),
            status: p.status.to_string(),
            authorization_url: p.authorization_url.clone(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}
