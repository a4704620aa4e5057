//! Outgoing mail: the message shape, the transport trait and its transports.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::templates::TemplateStore;

/// `MailSettings` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MailSettings {
    /// Endpoint of the JSON mail API, e.g. `https://api.mailer.example/v1/send`.
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    pub from_name: String,
    pub template_dir: Option<String>,
}

impl MailSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    /// Base64 content.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailData {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Option<Vec<MailAttachment>>,
}

/// A mail transport.
///
/// `send` reports delivery as a flag; transports log their own failures.
#[async_trait]
pub trait MailService: Send + Sync {
    fn load_template(&self, name: &str) -> String;

    async fn send(&self, mail: MailData) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP mail API
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    from: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<&'a [MailAttachment]>,
}

#[derive(Debug, Clone)]
pub struct HttpMailService {
    http: reqwest::Client,
    settings: MailSettings,
    templates: TemplateStore,
}

impl HttpMailService {
    pub fn new(settings: MailSettings, templates: TemplateStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            templates,
        }
    }

    async fn post(&self, mail: &MailData) -> Result<(), reqwest::Error> {
        let body = SendBody {
            from: Address {
                email: &self.settings.from_address,
                name: &self.settings.from_name,
            },
            to: mail.to.iter().map(|email| Address { email, name: "" }).collect(),
            subject: &mail.subject,
            html: &mail.body,
            attachments: mail.attachments.as_deref(),
        };
        self.http
            .post(&self.settings.api_url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl MailService for HttpMailService {
    fn load_template(&self, name: &str) -> String {
        self.templates.load(name)
    }

    async fn send(&self, mail: MailData) -> bool {
        match self.post(&mail).await {
            Ok(()) => {
                tracing::info!(to = ?mail.to, subject = %mail.subject, "mail sent");
                true
            }
            Err(err) => {
                tracing::error!(to = ?mail.to, subject = %mail.subject, error = %err, "mail delivery failed");
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Development and test transports
// ─────────────────────────────────────────────────────────────────────────────

/// Logs mail instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailService {
    templates: TemplateStore,
}

impl LogMailService {
    pub fn new(templates: TemplateStore) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl MailService for LogMailService {
    fn load_template(&self, name: &str) -> String {
        self.templates.load(name)
    }

    async fn send(&self, mail: MailData) -> bool {
        tracing::info!(to = ?mail.to, subject = %mail.subject, body_len = mail.body.len(), "mail (not sent)");
        true
    }
}

/// Keeps sent mail in memory.
#[derive(Debug, Default)]
pub struct InMemoryMailService {
    templates: TemplateStore,
    sent: Mutex<Vec<MailData>>,
    failing: bool,
}

impl InMemoryMailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<MailData> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailService for InMemoryMailService {
    fn load_template(&self, name: &str) -> String {
        self.templates.load(name)
    }

    async fn send(&self, mail: MailData) -> bool {
        if self.failing {
            return false;
        }
        match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(mail);
                true
            }
            Err(_) => false,
        }
    }
}
