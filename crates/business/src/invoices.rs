use std::sync::Arc;

use chrono::{DateTime, Utc};

use kluster_core::{
    ClientId, CurrentUser, InvoiceId, ProductId, Role, ServiceError, ServiceResult, validate_request,
};
use kluster_messaging::{InvoiceCreated, Publisher};

use crate::client::Client;
use crate::clients::repository_error;
use crate::dto::{InvoiceRequest, InvoiceResponse};
use crate::errors;
use crate::invoice::{Invoice, InvoiceItem, InvoiceStatus, TransitionError, compute_total};
use crate::repository::{ClientRepository, InvoiceRepository, ProductRepository};

fn parse_id(raw: &str) -> Result<InvoiceId, ServiceError> {
    raw.parse().map_err(|_| errors::invoice::NOT_FOUND)
}

fn transition_error(err: TransitionError) -> ServiceError {
    match err {
        TransitionError::AlreadyPaid => errors::invoice::ALREADY_PAID,
        TransitionError::Cancelled => errors::invoice::CANCELLED,
    }
}

/// Parse a status filter as received on the query string.
pub fn parse_status(raw: &str) -> Result<InvoiceStatus, ServiceError> {
    raw.parse().map_err(|_| errors::invoice::INVALID_STATUS)
}

/// Checked request content ready to be written onto an invoice.
struct InvoiceDraft {
    client: Client,
    items: Vec<InvoiceItem>,
    due_date: DateTime<Utc>,
    total: kluster_core::Money,
}

#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    clients: Arc<dyn ClientRepository>,
    products: Arc<dyn ProductRepository>,
    publisher: Publisher,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        clients: Arc<dyn ClientRepository>,
        products: Arc<dyn ProductRepository>,
        publisher: Publisher,
    ) -> Self {
        Self {
            invoices,
            clients,
            products,
            publisher,
        }
    }

    async fn find(&self, principal: &CurrentUser, id: &str) -> ServiceResult<Invoice> {
        self.invoices
            .get(&principal.user_id, &parse_id(id)?)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| errors::invoice::NOT_FOUND.into())
    }

    async fn draft(&self, principal: &CurrentUser, request: InvoiceRequest, now: DateTime<Utc>) -> ServiceResult<InvoiceDraft> {
        validate_request(&request)?;

        let due_date = request.due_date.unwrap_or(now);
        if due_date < now {
            return Err(errors::invoice::DUE_DATE_IN_PAST.into());
        }

        let client_id: ClientId = request
            .client_id
            .trim()
            .parse()
            .map_err(|_| errors::client::NOT_FOUND)?;
        let client = self
            .clients
            .get(&principal.user_id, &client_id)
            .await
            .map_err(repository_error)?
            .ok_or(errors::client::NOT_FOUND)?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let product_id = match item.product_id.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => {
                    let id: ProductId = raw.parse().map_err(|_| errors::product::NOT_FOUND)?;
                    self.products
                        .get(&principal.user_id, &id)
                        .await
                        .map_err(repository_error)?
                        .ok_or(errors::product::NOT_FOUND)?;
                    Some(id)
                }
            };
            items.push(InvoiceItem {
                description: item.description.trim().to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                product_id,
            });
        }
        let total = compute_total(&items).map_err(|_| errors::invoice::TOTAL_OVERFLOW)?;

        Ok(InvoiceDraft {
            client,
            items,
            due_date,
            total,
        })
    }

    /// Issue an invoice to one of the caller's clients and announce it.
    pub async fn create(&self, principal: &CurrentUser, request: InvoiceRequest) -> ServiceResult<InvoiceResponse> {
        principal.require_role(Role::Business)?;
        let now = Utc::now();
        let draft = self.draft(principal, request, now).await?;

        let invoice = Invoice {
            id: InvoiceId::new(),
            business_id: principal.user_id.clone(),
            client_id: draft.client.id.clone(),
            items: draft.items,
            due_date: draft.due_date,
            status: InvoiceStatus::Pending,
            total: draft.total,
            created_at: now,
            updated_at: now,
        };
        self.invoices.save(&invoice).await.map_err(repository_error)?;
        tracing::info!(invoice_id = %invoice.id, total = %invoice.total, "invoice created");

        let message = InvoiceCreated {
            invoice_id: invoice.id.clone(),
            business_id: invoice.business_id.clone(),
            client_id: draft.client.id,
            client_email: draft.client.email_address,
            client_first_name: draft.client.first_name,
            client_last_name: draft.client.last_name,
            total: invoice.total,
            due_date: invoice.due_date,
        };
        if let Err(err) = self.publisher.publish(&message) {
            tracing::error!(invoice_id = %invoice.id, error = %err, "failed to publish InvoiceCreated");
        }

        Ok(InvoiceResponse::from(&invoice))
    }

    pub async fn get(&self, principal: &CurrentUser, id: &str) -> ServiceResult<InvoiceResponse> {
        principal.require_role(Role::Business)?;
        Ok(InvoiceResponse::from(&self.find(principal, id).await?))
    }

    /// Owner-scoped invoice for other modules (payments).
    pub async fn find_for_owner(&self, principal: &CurrentUser, id: &InvoiceId) -> ServiceResult<Invoice> {
        principal.require_role(Role::Business)?;
        self.invoices
            .get(&principal.user_id, id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| errors::invoice::NOT_FOUND.into())
    }

    pub async fn list(
        &self,
        principal: &CurrentUser,
        status: Option<InvoiceStatus>,
    ) -> ServiceResult<Vec<InvoiceResponse>> {
        principal.require_role(Role::Business)?;
        let invoices = self
            .invoices
            .list(&principal.user_id, status)
            .await
            .map_err(repository_error)?;
        Ok(invoices.iter().map(InvoiceResponse::from).collect())
    }

    pub async fn update(
        &self,
        principal: &CurrentUser,
        id: &str,
        request: InvoiceRequest,
    ) -> ServiceResult<InvoiceResponse> {
        principal.require_role(Role::Business)?;
        let mut invoice = self.find(principal, id).await?;
        invoice.ensure_editable().map_err(transition_error)?;

        let now = Utc::now();
        let draft = self.draft(principal, request, now).await?;
        invoice
            .revise(draft.client.id, draft.items, draft.due_date, draft.total, now)
            .map_err(transition_error)?;
        self.invoices.save(&invoice).await.map_err(repository_error)?;

        Ok(InvoiceResponse::from(&invoice))
    }

    pub async fn cancel(&self, principal: &CurrentUser, id: &str) -> ServiceResult<InvoiceResponse> {
        principal.require_role(Role::Business)?;
        let mut invoice = self.find(principal, id).await?;
        invoice.cancel(Utc::now()).map_err(transition_error)?;
        self.invoices.save(&invoice).await.map_err(repository_error)?;

        tracing::info!(invoice_id = %invoice.id, "invoice cancelled");
        Ok(InvoiceResponse::from(&invoice))
    }

    pub async fn delete(&self, principal: &CurrentUser, id: &str) -> ServiceResult<()> {
        principal.require_role(Role::Business)?;
        let invoice = self.find(principal, id).await?;
        if !invoice.can_delete() {
            return Err(errors::invoice::ALREADY_PAID.into());
        }
        self.invoices
            .delete(&principal.user_id, &invoice.id)
            .await
            .map_err(repository_error)?;
        Ok(())
    }

    /// Record a completed payment. Safe to call more than once.
    pub async fn mark_paid(&self, id: &InvoiceId) -> ServiceResult<bool> {
        let mut invoice = self
            .invoices
            .get_any(id)
            .await
            .map_err(repository_error)?
            .ok_or(errors::invoice::NOT_FOUND)?;

        let changed = invoice.mark_paid(Utc::now()).map_err(transition_error)?;
        if changed {
            self.invoices.save(&invoice).await.map_err(repository_error)?;
            tracing::info!(invoice_id = %invoice.id, "invoice marked paid");
        }
        Ok(changed)
    }

    /// Flag every pending invoice past its due date. Returns how many changed.
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let candidates = self.invoices.list_past_due(now).await.map_err(repository_error)?;
        let mut changed = 0;
        for mut invoice in candidates {
            if invoice.mark_overdue(now) {
                self.invoices.save(&invoice).await.map_err(repository_error)?;
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::info!(count = changed, "invoices marked overdue");
        }
        Ok(changed)
    }
}
