//! Payment module error descriptors.

use kluster_core::ServiceError;

pub const NOT_FOUND: ServiceError = ServiceError::not_found("Payment.NotFound", "The payment was not found.");

/// Code lives under the `Invoice` area.
pub const NOT_VALID: ServiceError = ServiceError::validation("Invoice.NotValid", "Could not validate transaction.");

pub const GATEWAY_UNAVAILABLE: ServiceError = ServiceError::failure(
    "Payment.GatewayUnavailable",
    "The payment provider could not be reached. Please try again.",
);

pub const NOTHING_TO_PAY: ServiceError =
    ServiceError::validation("Payment.NothingToPay", "The invoice total must be greater than zero.");

pub const UNEXPECTED: ServiceError =
    ServiceError::unexpected("Payment.Unexpected", "An unexpected error occurred while processing the payment.");
