//! User module error descriptors.

use kluster_core::ServiceError;

pub const NOT_FOUND: ServiceError = ServiceError::not_found("User.NotFound", "The user was not found.");

pub const DUPLICATE_EMAIL: ServiceError = ServiceError::conflict(
    "User.DuplicateEmail",
    "A user with this email address already exists.",
);

pub const INVALID_CREDENTIALS: ServiceError =
    ServiceError::unauthorized("User.InvalidCredentials", "Invalid email or password.");

pub const LOCKED_OUT: ServiceError = ServiceError::forbidden(
    "User.LockedOut",
    "This account is locked due to too many failed login attempts. Try again later.",
);

pub const INVALID_OTP: ServiceError =
    ServiceError::validation("User.InvalidOtp", "The verification code is invalid or has expired.");

pub const EMAIL_NOT_CONFIRMED: ServiceError =
    ServiceError::forbidden("User.EmailNotConfirmed", "The email address has not been confirmed.");

pub const UNEXPECTED: ServiceError =
    ServiceError::unexpected("User.Unexpected", "An unexpected error occurred while processing the user.");
