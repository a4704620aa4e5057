//! Paystack integration via REST API (no SDK dependency).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kluster_core::Money;

use crate::gateway::{GatewayError, InitializedTransaction, PaymentGateway, VerifiedTransaction};

fn default_base_url() -> String {
    "https://api.paystack.co".to_string()
}

/// `PaystackSettings` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaystackSettings {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl PaystackSettings {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.trim().is_empty()
    }
}

/// Paystack wraps every payload as `{ status, message, data }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    /// Minor units (kobo), sent as a string like the API examples.
    amount: String,
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    reference: String,
}

#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(settings: &PaystackSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(http: reqwest::Client, settings: &PaystackSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
        }
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, GatewayError> {
        if !envelope.status {
            return Err(GatewayError::Rejected(envelope.message));
        }
        envelope.data.ok_or(GatewayError::Rejected(envelope.message))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        callback_url: Option<&str>,
    ) -> Result<InitializedTransaction, GatewayError> {
        let body = InitializeBody {
            email,
            amount: amount.minor_units().to_string(),
            reference,
            callback_url,
        };
        let envelope: Envelope<InitializeData> = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let data = Self::unwrap_envelope(envelope)?;
        Ok(InitializedTransaction {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let envelope: Envelope<VerifyData> = self
            .http
            .get(format!("{}/transaction/verify/{reference}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .json()
            .await?;

        let data = Self::unwrap_envelope(envelope)?;
        Ok(VerifiedTransaction {
            status: data.status,
            amount: Money::from_minor(data.amount),
            reference: data.reference,
        })
    }
}
