//! Response envelopes and small request shapes owned by the HTTP layer.
//!
//! Module request/response bodies live in their crates; this file only adds
//! the uniform wrapper every endpoint answers with.

use serde::{Deserialize, Serialize};

use kluster_core::{ServiceError, ServiceErrors};

/// `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
}

impl From<&ServiceError> for ErrorDetail {
    fn from(error: &ServiceError) -> Self {
        Self {
            code: error.code().to_string(),
            description: error.description().to_string(),
        }
    }
}

/// Uniform error body. `message` repeats the first error's description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub errors: Vec<ErrorDetail>,
}

impl From<&ServiceErrors> for ErrorEnvelope {
    fn from(errors: &ServiceErrors) -> Self {
        Self {
            success: false,
            status_code: errors.status_code(),
            message: errors.first().description().to_string(),
            errors: errors.iter().map(ErrorDetail::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub jobs: Option<kluster_infra::jobs::JobStats>,
}
