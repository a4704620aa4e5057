//! Mail body templates.
//!
//! A template named `SendOtpEmail` is read from `<template_dir>/SendOtpEmail.html`
//! when a directory is configured and the file exists; otherwise the copy
//! compiled into the binary is used.

use std::path::PathBuf;

pub const SEND_OTP_EMAIL: &str = "SendOtpEmail";
pub const SEND_WELCOME_MAIL: &str = "SendWelcomeMail";
pub const SEND_INVOICE_MAIL: &str = "SendInvoiceMail";
pub const SEND_PAYMENT_RECEIPT: &str = "SendPaymentReceipt";

fn embedded(name: &str) -> Option<&'static str> {
    match name {
        SEND_OTP_EMAIL => Some(include_str!("../templates/SendOtpEmail.html")),
        SEND_WELCOME_MAIL => Some(include_str!("../templates/SendWelcomeMail.html")),
        SEND_INVOICE_MAIL => Some(include_str!("../templates/SendInvoiceMail.html")),
        SEND_PAYMENT_RECEIPT => Some(include_str!("../templates/SendPaymentReceipt.html")),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    dir: Option<PathBuf>,
}

impl TemplateStore {
    pub fn new(dir: Option<impl Into<PathBuf>>) -> Self {
        Self { dir: dir.map(Into::into) }
    }

    pub fn embedded_only() -> Self {
        Self::default()
    }

    /// Returns an empty body for unknown names.
    pub fn load(&self, name: &str) -> String {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.html"));
            match std::fs::read_to_string(&path) {
                Ok(body) => return body,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(template = name, path = %path.display(), error = %err, "template unreadable, using default");
                }
            }
        }

        match embedded(name) {
            Some(body) => body.to_string(),
            None => {
                tracing::warn!(template = name, "unknown mail template");
                String::new()
            }
        }
    }
}
