use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kluster_core::{ClientId, Entity, InvoiceId, Money, OwnedEntity, ProductId, UserId};

/// Invoice status lifecycle.
///
/// `Pending -> Paid`, `Pending -> Overdue -> Paid`, and `Pending | Overdue -> Cancelled`.
/// `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
            InvoiceStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether the invoice still expects a payment.
    pub const fn is_open(self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown invoice status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for InvoiceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            InvoiceStatus::Pending,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// One billed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: u32,
    /// Price in smallest currency unit.
    pub unit_price: Money,
    pub product_id: Option<ProductId>,
}

impl InvoiceItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Why a status transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invoice is already paid")]
    AlreadyPaid,

    #[error("invoice is cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invoice total overflows")]
pub struct TotalOverflow;

/// Sum of `quantity * unit_price` over all items.
pub fn compute_total(items: &[InvoiceItem]) -> Result<Money, TotalOverflow> {
    items.iter().try_fold(Money::ZERO, |acc, item| {
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or(TotalOverflow)
    })
}

/// A bill sent by a business to one of its clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub business_id: UserId,
    pub client_id: ClientId,
    pub items: Vec<InvoiceItem>,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Paid and cancelled invoices are frozen.
    pub fn ensure_editable(&self) -> Result<(), TransitionError> {
        match self.status {
            InvoiceStatus::Paid => Err(TransitionError::AlreadyPaid),
            InvoiceStatus::Cancelled => Err(TransitionError::Cancelled),
            InvoiceStatus::Pending | InvoiceStatus::Overdue => Ok(()),
        }
    }

    /// Replace the billed content. Only open invoices can be edited.
    pub fn revise(
        &mut self,
        client_id: ClientId,
        items: Vec<InvoiceItem>,
        due_date: DateTime<Utc>,
        total: Money,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_editable()?;
        self.client_id = client_id;
        self.items = items;
        self.total = total;
        self.due_date = due_date;
        if self.status == InvoiceStatus::Overdue && due_date > now {
            self.status = InvoiceStatus::Pending;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Returns `Ok(false)` when the invoice was already paid (no-op).
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<bool, TransitionError> {
        match self.status {
            InvoiceStatus::Paid => Ok(false),
            InvoiceStatus::Cancelled => Err(TransitionError::Cancelled),
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {
                self.status = InvoiceStatus::Paid;
                self.updated_at = now;
                Ok(true)
            }
        }
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Pending && self.due_date < now
    }

    /// Flag a pending invoice whose due date has passed. Returns whether it changed.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_past_due(now) {
            return false;
        }
        self.status = InvoiceStatus::Overdue;
        self.updated_at = now;
        true
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_editable()?;
        self.status = InvoiceStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    pub fn can_delete(&self) -> bool {
        self.status != InvoiceStatus::Paid
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &InvoiceId {
        &self.id
    }
}

impl OwnedEntity for Invoice {
    fn owner_id(&self) -> &UserId {
        &self.business_id
    }
}
