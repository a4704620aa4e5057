//! `kluster-notifications`: transactional mail.
//!
//! Domain events are turned into `notifications.send_mail` jobs by the
//! consumers in [`consumers`]; the job executor delivers them through a
//! [`MailService`].

pub mod consumers;
pub mod jobs;
pub mod mail;
pub mod service;
pub mod templates;

pub use consumers::{InvoiceMailConsumer, OtpMailConsumer, PaymentReceiptConsumer, WelcomeMailConsumer};
pub use jobs::{DeliveryError, JobQueue, MailJob, QueueError, SEND_MAIL_JOB, enqueue_mail};
pub use mail::{HttpMailService, InMemoryMailService, LogMailService, MailAttachment, MailData, MailService, MailSettings};
pub use service::{NotificationService, SendInvoiceMailRequest, SendOtpEmailRequest, SendPaymentReceiptRequest};
pub use templates::TemplateStore;
