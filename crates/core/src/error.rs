//! Error descriptors shared by every module.
//!
//! Services never throw: they return a [`ServiceResult`] whose error side is a
//! non-empty list of [`ServiceError`] descriptors. The HTTP boundary maps the
//! descriptor kind to a status code.

use std::borrow::Cow;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type returned by every module service.
pub type ServiceResult<T> = Result<T, ServiceErrors>;

/// Category of a [`ServiceError`], used to pick the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Failure,
    Unexpected,
    Validation,
    Conflict,
    NotFound,
    Unauthorized,
    Forbidden,
}

impl ErrorKind {
    /// HTTP status code for this category.
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Failure | ErrorKind::Unexpected => 500,
        }
    }
}

/// Static error descriptor: a machine-readable code plus a human description.
///
/// Codes follow the `"<Area>.<Name>"` convention (e.g. `"Product.InvalidPrice"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[error("{code}: {description}")]
pub struct ServiceError {
    #[serde(skip)]
    kind: ErrorKind,
    code: Cow<'static, str>,
    description: Cow<'static, str>,
}

impl ServiceError {
    pub const fn new_static(kind: ErrorKind, code: &'static str, description: &'static str) -> Self {
        Self {
            kind,
            code: Cow::Borrowed(code),
            description: Cow::Borrowed(description),
        }
    }

    pub fn new(
        kind: ErrorKind,
        code: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            description: description.into(),
        }
    }

    pub const fn validation(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::Validation, code, description)
    }

    pub const fn not_found(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::NotFound, code, description)
    }

    pub const fn conflict(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::Conflict, code, description)
    }

    pub const fn unauthorized(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::Unauthorized, code, description)
    }

    pub const fn forbidden(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::Forbidden, code, description)
    }

    pub const fn failure(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::Failure, code, description)
    }

    pub const fn unexpected(code: &'static str, description: &'static str) -> Self {
        Self::new_static(ErrorKind::Unexpected, code, description)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Non-empty list of error descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.first())]
pub struct ServiceErrors {
    first: ServiceError,
    rest: Vec<ServiceError>,
}

impl ServiceErrors {
    pub fn single(error: ServiceError) -> Self {
        Self {
            first: error,
            rest: Vec::new(),
        }
    }

    /// Build from a list; `None` when the list is empty.
    pub fn from_vec(mut errors: Vec<ServiceError>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let first = errors.remove(0);
        Some(Self { first, rest: errors })
    }

    pub fn first(&self) -> &ServiceError {
        &self.first
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceError> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn all_validation(&self) -> bool {
        self.iter().all(|e| e.kind() == ErrorKind::Validation)
    }

    /// Status code for the whole list.
    ///
    /// A list made only of validation errors is a 400; otherwise the first
    /// error decides.
    pub fn status_code(&self) -> u16 {
        if self.all_validation() {
            ErrorKind::Validation.status_code()
        } else {
            self.first.kind().status_code()
        }
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.iter().any(|e| e.code() == code)
    }
}

impl From<ServiceError> for ServiceErrors {
    fn from(value: ServiceError) -> Self {
        Self::single(value)
    }
}

impl Serialize for ServiceErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Descriptors shared across modules.
pub mod common {
    use super::ServiceError;

    pub const UNEXPECTED: ServiceError =
        ServiceError::unexpected("General.Unexpected", "An unexpected error occurred.");

    pub const FORBIDDEN: ServiceError = ServiceError::forbidden(
        "Auth.Forbidden",
        "You are not allowed to perform this operation.",
    );

    pub const UNAUTHORIZED: ServiceError =
        ServiceError::unauthorized("Auth.Unauthorized", "Authentication is required.");

    pub const INVALID_REQUEST: ServiceError =
        ServiceError::validation("Request.Invalid", "The request body could not be read.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_per_kind() {
        assert_eq!(ErrorKind::Validation.status_code(), 400);
        assert_eq!(ErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::Failure.status_code(), 500);
        assert_eq!(ErrorKind::Unexpected.status_code(), 500);
    }

    #[test]
    fn validation_only_list_is_bad_request() {
        let errors = ServiceErrors::from_vec(vec![
            ServiceError::validation("A.One", "one"),
            ServiceError::validation("B.Two", "two"),
        ])
        .unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.status_code(), 400);
    }

    #[test]
    fn mixed_list_uses_first_error() {
        let errors = ServiceErrors::from_vec(vec![
            ServiceError::not_found("A.Missing", "missing"),
            ServiceError::validation("B.Two", "two"),
        ])
        .unwrap();
        assert_eq!(errors.status_code(), 404);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(ServiceErrors::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn serializes_code_and_description_only() {
        let json = serde_json::to_value(ServiceErrors::single(common::FORBIDDEN)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "code": "Auth.Forbidden",
                "description": "You are not allowed to perform this operation."
            }])
        );
    }
}
