//! Mail delivery as background work.
//!
//! Consumers never send mail inline. They enqueue a `notifications.send_mail`
//! job whose payload is a [`MailJob`]; the job executor calls
//! [`NotificationService::deliver`] and retries on failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::{NotificationService, SendInvoiceMailRequest, SendOtpEmailRequest, SendPaymentReceiptRequest};

pub const SEND_MAIL_JOB: &str = "notifications.send_mail";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "camelCase")]
pub enum MailJob {
    Otp(SendOtpEmailRequest),
    #[serde(rename_all = "camelCase")]
    Welcome {
        email_address: String,
        first_name: String,
        last_name: String,
    },
    Invoice(SendInvoiceMailRequest),
    PaymentReceipt(SendPaymentReceiptRequest),
}

impl MailJob {
    pub fn recipient(&self) -> &str {
        match self {
            MailJob::Otp(r) => &r.email_address,
            MailJob::Welcome { email_address, .. } => email_address,
            MailJob::Invoice(r) => &r.email_address,
            MailJob::PaymentReceipt(r) => &r.email_address,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to serialize job payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("job store error: {0}")]
    Store(String),
}

/// Where modules put background work.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<(), QueueError>;
}

#[async_trait]
impl<Q: JobQueue + ?Sized> JobQueue for std::sync::Arc<Q> {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<(), QueueError> {
        (**self).enqueue(kind, payload).await
    }
}

pub async fn enqueue_mail(queue: &dyn JobQueue, job: &MailJob) -> Result<(), QueueError> {
    let payload = serde_json::to_value(job)?;
    queue.enqueue(SEND_MAIL_JOB, payload).await
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("malformed mail job: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("mail to {0} was not delivered")]
    NotDelivered(String),
}

impl NotificationService {
    /// Run one mail job. A transport failure is an error so the job is retried.
    pub async fn deliver(&self, job: &MailJob) -> Result<(), DeliveryError> {
        let delivered = match job {
            MailJob::Otp(request) => self.send_otp_email(request).await,
            MailJob::Welcome {
                email_address,
                first_name,
                last_name,
            } => self.send_welcome_mail(email_address, first_name, last_name).await,
            MailJob::Invoice(request) => self.send_invoice_mail(request).await,
            MailJob::PaymentReceipt(request) => self.send_payment_receipt(request).await,
        };
        if delivered {
            Ok(())
        } else {
            Err(DeliveryError::NotDelivered(job.recipient().to_string()))
        }
    }

    pub async fn deliver_payload(&self, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        let job: MailJob = serde_json::from_value(payload.clone())?;
        self.deliver(&job).await
    }
}
