//! Message consumers that turn domain events into mail jobs.

use std::sync::Arc;

use async_trait::async_trait;

use kluster_messaging::{
    ConsumeContext, ConsumeError, Consumer, InvoiceCreated, OtpRequested, PaymentCompleted, UserRegistered,
};

use crate::jobs::{JobQueue, MailJob, enqueue_mail};
use crate::service::{SendInvoiceMailRequest, SendOtpEmailRequest, SendPaymentReceiptRequest};

async fn schedule(queue: &dyn JobQueue, job: MailJob, context: &ConsumeContext) -> Result<(), ConsumeError> {
    enqueue_mail(queue, &job).await.map_err(|err| {
        tracing::error!(message_id = %context.message_id, error = %err, "failed to enqueue mail job");
        ConsumeError::handler(err.to_string())
    })?;
    tracing::debug!(message_id = %context.message_id, to = job.recipient(), "mail job enqueued");
    Ok(())
}

pub struct WelcomeMailConsumer {
    queue: Arc<dyn JobQueue>,
}

impl WelcomeMailConsumer {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Consumer<UserRegistered> for WelcomeMailConsumer {
    async fn consume(&self, message: UserRegistered, context: &ConsumeContext) -> Result<(), ConsumeError> {
        let job = MailJob::Welcome {
            email_address: message.email,
            first_name: message.first_name,
            last_name: message.last_name,
        };
        schedule(self.queue.as_ref(), job, context).await
    }
}

pub struct OtpMailConsumer {
    queue: Arc<dyn JobQueue>,
}

impl OtpMailConsumer {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Consumer<OtpRequested> for OtpMailConsumer {
    async fn consume(&self, message: OtpRequested, context: &ConsumeContext) -> Result<(), ConsumeError> {
        let job = MailJob::Otp(SendOtpEmailRequest {
            email_address: message.email,
            first_name: message.first_name,
            last_name: message.last_name,
            otp: message.otp,
            user_id: message.user_id.to_string(),
        });
        schedule(self.queue.as_ref(), job, context).await
    }
}

pub struct InvoiceMailConsumer {
    queue: Arc<dyn JobQueue>,
}

impl InvoiceMailConsumer {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Consumer<InvoiceCreated> for InvoiceMailConsumer {
    async fn consume(&self, message: InvoiceCreated, context: &ConsumeContext) -> Result<(), ConsumeError> {
        let job = MailJob::Invoice(SendInvoiceMailRequest {
            email_address: message.client_email,
            first_name: message.client_first_name,
            last_name: message.client_last_name,
            invoice_id: message.invoice_id.to_string(),
            total: message.total,
            due_date: message.due_date,
        });
        schedule(self.queue.as_ref(), job, context).await
    }
}

pub struct PaymentReceiptConsumer {
    queue: Arc<dyn JobQueue>,
}

impl PaymentReceiptConsumer {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Consumer<PaymentCompleted> for PaymentReceiptConsumer {
    async fn consume(&self, message: PaymentCompleted, context: &ConsumeContext) -> Result<(), ConsumeError> {
        let job = MailJob::PaymentReceipt(SendPaymentReceiptRequest {
            email_address: message.email,
            invoice_id: message.invoice_id.to_string(),
            reference: message.reference,
            amount: message.amount,
        });
        schedule(self.queue.as_ref(), job, context).await
    }
}
