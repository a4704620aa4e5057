//! Payment gateway boundary.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kluster_core::Money;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    /// Gateway status string, `"success"` when the charge went through.
    pub status: String,
    pub amount: Money,
    pub reference: String,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// A hosted-checkout payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        callback_url: Option<&str>,
    ) -> Result<InitializedTransaction, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;
}

/// Gateway that settles transactions locally.
///
/// Every initialized transaction verifies as successful for its full amount
/// unless an outcome was set with [`FakeGateway::set_outcome`].
#[derive(Debug, Default)]
pub struct FakeGateway {
    transactions: Mutex<HashMap<String, VerifiedTransaction>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override what `verify` reports for `reference`.
    pub fn set_outcome(&self, reference: &str, status: &str, amount: Money) {
        if let Ok(mut map) = self.transactions.lock() {
            map.insert(
                reference.to_string(),
                VerifiedTransaction {
                    status: status.to_string(),
                    amount,
                    reference: reference.to_string(),
                },
            );
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(
        &self,
        _email: &str,
        amount: Money,
        reference: &str,
        _callback_url: Option<&str>,
    ) -> Result<InitializedTransaction, GatewayError> {
        self.set_outcome(reference, "success", amount);
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.local/{reference}"),
            access_code: format!("ac_{reference}"),
            reference: reference.to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let map = self
            .transactions
            .lock()
            .map_err(|_| GatewayError::Rejected("fake gateway poisoned".into()))?;
        map.get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("Transaction reference not found: {reference}")))
    }
}
