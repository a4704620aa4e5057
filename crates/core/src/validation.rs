//! Shared validation rules.
//!
//! Request DTOs derive [`validator::Validate`] and reference these functions
//! with `#[validate(custom(function = ...))]`. [`validate_request`] turns the
//! collected failures into `Validation` descriptors.

use std::borrow::Cow;

use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::constants::AppConstants;
use crate::error::{ErrorKind, ServiceError, ServiceErrors, ServiceResult};
use crate::principal::Role;
use crate::value_object::Money;

fn rule_error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn name_rule(label: &'static str, value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(rule_error("Required", format!("{label} is required.")));
    }
    let len = value.chars().count();
    if len < AppConstants::MIN_NAME_LENGTH {
        return Err(rule_error(
            "TooShort",
            format!(
                "{label} must be at least {} characters long.",
                AppConstants::MIN_NAME_LENGTH
            ),
        ));
    }
    if len > AppConstants::MAX_NAME_LENGTH {
        return Err(rule_error(
            "TooLong",
            format!(
                "{label} must not exceed {} characters.",
                AppConstants::MAX_NAME_LENGTH
            ),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '\'')
    {
        return Err(rule_error(
            "InvalidCharacters",
            format!("{label} may only contain letters, spaces, hyphens and apostrophes."),
        ));
    }
    Ok(())
}

pub fn validate_first_name(value: &str) -> Result<(), ValidationError> {
    name_rule("First name", value)
}

pub fn validate_last_name(value: &str) -> Result<(), ValidationError> {
    name_rule("Last name", value)
}

pub fn validate_email_address(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule_error("Required", "Email address is required."));
    }
    if !value.trim().validate_email() {
        return Err(rule_error("Invalid", "Email address is not valid."));
    }
    Ok(())
}

pub fn validate_address(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule_error("Required", "Address is required."));
    }
    if value.chars().count() > AppConstants::MAX_ADDRESS_LENGTH {
        return Err(rule_error(
            "TooLong",
            format!(
                "Address must not exceed {} characters.",
                AppConstants::MAX_ADDRESS_LENGTH
            ),
        ));
    }
    Ok(())
}

/// Phone numbers: optional leading `+`, digits and separators, 7 to 15 digits.
pub fn validate_phone_number(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    let body = value.strip_prefix('+').unwrap_or(value);
    let valid_chars = body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    let digits = body.chars().filter(char::is_ascii_digit).count();
    if !valid_chars || !(7..=15).contains(&digits) {
        return Err(rule_error("Invalid", "Phone number is not valid."));
    }
    Ok(())
}

pub fn validate_role(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule_error("Required", "Role is required."));
    }
    if value.len() > AppConstants::MAX_ROLE_LENGTH || value.parse::<Role>().is_err() {
        return Err(rule_error("Invalid", "Role must be either 'Client' or 'Business'."));
    }
    Ok(())
}

/// Password policy: at least six characters with a digit, an uppercase letter
/// and a non-alphanumeric character.
pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(rule_error("Required", "Password is required."));
    }
    if value.chars().count() < AppConstants::MIN_PASSWORD_LENGTH {
        return Err(rule_error(
            "TooShort",
            format!(
                "Password must be at least {} characters long.",
                AppConstants::MIN_PASSWORD_LENGTH
            ),
        ));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(rule_error("RequiresDigit", "Password must contain at least one digit."));
    }
    if !value.chars().any(char::is_uppercase) {
        return Err(rule_error(
            "RequiresUpper",
            "Password must contain at least one uppercase letter.",
        ));
    }
    if value.chars().all(char::is_alphanumeric) {
        return Err(rule_error(
            "RequiresNonAlphanumeric",
            "Password must contain at least one non-alphanumeric character.",
        ));
    }
    Ok(())
}

pub fn validate_price(value: &Money) -> Result<(), ValidationError> {
    if value.is_negative() {
        return Err(rule_error(
            "InvalidPrice",
            "The price must be greater than, or equal to zero.",
        ));
    }
    Ok(())
}

/// Run the derived rules of `request` and map failures to descriptors.
///
/// Each failure becomes a `Validation` error whose code is
/// `"<Field>.<Rule>"`, e.g. `"FirstName.TooShort"`. Nested fields are joined
/// with a dot and list positions use brackets (`"Items[0].Quantity.Range"`).
pub fn validate_request<T: Validate>(request: &T) -> ServiceResult<()> {
    match request.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let mut out = Vec::new();
            flatten(&errors, "", &mut out);
            out.sort_by(|a, b| a.code().cmp(b.code()));
            Err(ServiceErrors::from_vec(out).unwrap_or_else(|| {
                ServiceErrors::single(ServiceError::validation(
                    "Request.Invalid",
                    "The request is not valid.",
                ))
            }))
        }
    }
}

fn flatten(errors: &ValidationErrors, prefix: &str, out: &mut Vec<ServiceError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            pascal_case(field)
        } else {
            format!("{prefix}.{}", pascal_case(field))
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let description = error
                        .message
                        .clone()
                        .unwrap_or_else(|| Cow::Owned(format!("'{path}' is not valid.")));
                    out.push(ServiceError::new(
                        ErrorKind::Validation,
                        format!("{path}.{}", pascal_case(&error.code)),
                        description,
                    ));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

fn pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
