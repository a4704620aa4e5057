use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kluster_core::Money;

use crate::mail::{MailData, MailService};
use crate::templates::{SEND_INVOICE_MAIL, SEND_OTP_EMAIL, SEND_PAYMENT_RECEIPT, SEND_WELCOME_MAIL};

pub const OTP_SUBJECT: &str = "Verify your email address!";
pub const WELCOME_SUBJECT: &str = "Welcome To SimpleBiz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpEmailRequest {
    pub email_address: String,
    pub first_name: String,
    pub last_name: String,
    pub otp: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInvoiceMailRequest {
    pub email_address: String,
    pub first_name: String,
    pub last_name: String,
    pub invoice_id: String,
    pub total: Money,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPaymentReceiptRequest {
    pub email_address: String,
    pub invoice_id: String,
    pub reference: String,
    pub amount: Money,
}

/// Renders templates and hands them to the mail transport.
#[derive(Clone)]
pub struct NotificationService {
    mail: Arc<dyn MailService>,
}

impl NotificationService {
    pub fn new(mail: Arc<dyn MailService>) -> Self {
        Self { mail }
    }

    pub async fn send_otp_email(&self, request: &SendOtpEmailRequest) -> bool {
        let body = self
            .mail
            .load_template(SEND_OTP_EMAIL)
            .replace("{FirstName}", &request.first_name)
            .replace("{LastName}", &request.last_name)
            .replace("{Token}", &urlencoding::encode(&request.otp))
            .replace("{UserId}", &request.user_id);

        self.mail
            .send(MailData {
                to: vec![request.email_address.clone()],
                subject: OTP_SUBJECT.to_string(),
                body,
                attachments: None,
            })
            .await
    }

    pub async fn send_welcome_mail(&self, email_address: &str, first_name: &str, last_name: &str) -> bool {
        let body = self
            .mail
            .load_template(SEND_WELCOME_MAIL)
            .replace("{FirstName}", first_name)
            .replace("{LastName}", last_name);

        self.mail
            .send(MailData {
                to: vec![email_address.to_string()],
                subject: WELCOME_SUBJECT.to_string(),
                body,
                attachments: None,
            })
            .await
    }

    pub async fn send_invoice_mail(&self, request: &SendInvoiceMailRequest) -> bool {
        let body = self
            .mail
            .load_template(SEND_INVOICE_MAIL)
            .replace("{FirstName}", &request.first_name)
            .replace("{LastName}", &request.last_name)
            .replace("{InvoiceId}", &request.invoice_id)
            .replace("{Total}", &request.total.to_string())
            .replace("{DueDate}", &request.due_date.format("%d %b %Y").to_string());

        self.mail
            .send(MailData {
                to: vec![request.email_address.clone()],
                subject: format!("Invoice {}", request.invoice_id),
                body,
                attachments: None,
            })
            .await
    }

    pub async fn send_payment_receipt(&self, request: &SendPaymentReceiptRequest) -> bool {
        let body = self
            .mail
            .load_template(SEND_PAYMENT_RECEIPT)
            .replace("{InvoiceId}", &request.invoice_id)
            .replace("{Reference}", &request.reference)
            .replace("{Amount}", &request.amount.to_string());

        self.mail
            .send(MailData {
                to: vec![request.email_address.clone()],
                subject: format!("Payment received for invoice {}", request.invoice_id),
                body,
                attachments: None,
            })
            .await
    }
}
