//! Request/response shapes for clients, products and invoices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use kluster_core::validation::{
    validate_address, validate_email_address, validate_first_name, validate_last_name,
    validate_phone_number, validate_price,
};
use kluster_core::{AppConstants, Money};

use crate::client::Client;
use crate::invoice::{Invoice, InvoiceItem};
use crate::product::Product;

// ─────────────────────────────────────────────────────────────────────────────
// Clients
// ─────────────────────────────────────────────────────────────────────────────

/// Body of both client create and update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientRequest {
    #[validate(custom(function = "validate_first_name"))]
    pub first_name: String,
    #[validate(custom(function = "validate_last_name"))]
    pub last_name: String,
    #[validate(custom(function = "validate_email_address"))]
    pub email_address: String,
    #[validate(custom(function = "validate_address"))]
    pub address: String,
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Client> for ClientResponse {
    fn from(c: &Client) -> Self {
        Self {
            id: c.id.to_string(),
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email_address: c.email_address.clone(),
            address: c.address.clone(),
            phone_number: c.phone_number.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Products
// ─────────────────────────────────────────────────────────────────────────────

fn validate_product_name(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ValidationError::new("Required").with_message("Product name is required.".into()));
    }
    if len > AppConstants::MAX_PRODUCT_NAME_LENGTH {
        return Err(ValidationError::new("TooLong").with_message(
            format!(
                "Product name must not exceed {} characters.",
                AppConstants::MAX_PRODUCT_NAME_LENGTH
            )
            .into(),
        ));
    }
    Ok(())
}

/// Body of both product create and update. `price` is checked by the service.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(custom(function = "validate_product_name"))]
    pub name: String,
    #[validate(length(max = 500, code = "TooLong", message = "Description must not exceed 500 characters."))]
    pub description: Option<String>,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.price,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invoices
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, max = 500, code = "Required", message = "Item description is required."))]
    pub description: String,
    #[validate(range(min = 1, code = "Range", message = "Quantity must be at least 1."))]
    pub quantity: u32,
    #[validate(custom(function = "validate_price"))]
    pub unit_price: Money,
    pub product_id: Option<String>,
}

/// Body of both invoice create and update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceRequest {
    #[validate(length(min = 1, code = "Required", message = "Client id is required."))]
    pub client_id: String,
    #[validate(required(code = "Required", message = "Due date is required."))]
    pub due_date: Option<DateTime<Utc>>,
    #[validate(
        length(min = 1, code = "Required", message = "An invoice needs at least one item."),
        nested
    )]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemResponse {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: String,
    pub client_id: String,
    pub items: Vec<InvoiceItemResponse>,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&InvoiceItem> for InvoiceItemResponse {
    fn from(i: &InvoiceItem) -> Self {
        Self {
            description: i.description.clone(),
            quantity: i.quantity,
            unit_price: i.unit_price,
            line_total: i.line_total().unwrap_or(Money::ZERO),
            product_id: i.product_id.as_ref().map(ToString::to_string),
        }
    }
}

impl From<&Invoice> for InvoiceResponse {
    fn from(inv: &Invoice) -> Self {
        Self {
            id: inv.id.to_string(),
            client_id: inv.client_id.to_string(),
            items: inv.items.iter().map(InvoiceItemResponse::from).collect(),
            due_date: inv.due_date,
            status: inv.status.to_string(),
            total: inv.total,
            created_at: inv.created_at,
            updated_at: inv.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use kluster_core::validation::validate_request;

    use super::*;

    fn item(description: &str, quantity: u32) -> InvoiceItemRequest {
        InvoiceItemRequest {
            description: description.into(),
            quantity,
            unit_price: Money::from_minor(1_000),
            product_id: None,
        }
    }

    #[test]
    fn invoice_without_items_is_rejected() {
        let request = InvoiceRequest {
            client_id: "C-1".into(),
            due_date: Some(Utc::now() + Duration::days(7)),
            items: Vec::new(),
        };

        let errors = validate_request(&request).unwrap_err();
        assert!(errors.iter().any(|e| e.description() == "An invoice needs at least one item."));
    }

    #[test]
    fn item_rules_are_checked_through_the_invoice() {
        let request = InvoiceRequest {
            client_id: "C-1".into(),
            due_date: Some(Utc::now() + Duration::days(7)),
            items: vec![item("Design", 2), item("", 0)],
        };

        let errors = validate_request(&request).unwrap_err();
        let descriptions: Vec<_> = errors.iter().map(|e| e.description()).collect();
        assert!(descriptions.contains(&"Item description is required."));
        assert!(descriptions.contains(&"Quantity must be at least 1."));

        let valid = InvoiceRequest {
            items: vec![item("Design", 2)],
            ..request
        };
        assert!(validate_request(&valid).is_ok());
    }
}
