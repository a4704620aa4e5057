//! Business module error descriptors.

pub mod client {
    use kluster_core::ServiceError;

    pub const NOT_FOUND: ServiceError = ServiceError::not_found("Client.NotFound", "The client was not found.");

    pub const DUPLICATE_EMAIL: ServiceError = ServiceError::conflict(
        "Client.DuplicateEmail",
        "A client with this email address already exists.",
    );
}

pub mod product {
    use kluster_core::ServiceError;

    pub const NOT_FOUND: ServiceError =
        ServiceError::not_found("Product.NotFound", "The product was not found.");

    pub const INVALID_PRICE: ServiceError = ServiceError::validation(
        "Product.InvalidPrice",
        "The price must be greater than, or equal to zero.",
    );
}

pub mod invoice {
    use kluster_core::ServiceError;

    pub const NOT_FOUND: ServiceError =
        ServiceError::not_found("Invoice.NotFound", "The invoice was not found.");

    pub const ALREADY_PAID: ServiceError =
        ServiceError::conflict("Invoice.AlreadyPaid", "The invoice has already been paid.");

    pub const CANCELLED: ServiceError =
        ServiceError::conflict("Invoice.Cancelled", "The invoice has been cancelled.");

    pub const DUE_DATE_IN_PAST: ServiceError =
        ServiceError::validation("Invoice.DueDateInPast", "The due date cannot be in the past.");

    pub const INVALID_STATUS: ServiceError = ServiceError::validation(
        "Invoice.InvalidStatus",
        "Status must be one of Pending, Paid, Overdue or Cancelled.",
    );

    pub const TOTAL_OVERFLOW: ServiceError =
        ServiceError::validation("Invoice.TotalTooLarge", "The invoice total is too large.");
}

/// Storage failures surface as this descriptor.
pub const UNEXPECTED: kluster_core::ServiceError = kluster_core::ServiceError::unexpected(
    "Business.Unexpected",
    "An unexpected error occurred while processing the request.",
);
