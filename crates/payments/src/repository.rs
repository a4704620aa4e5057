use async_trait::async_trait;
use thiserror::Error;

use kluster_core::{InMemoryOwnedStore, InvoiceId, PaymentId, UserId};

use crate::payment::Payment;

#[derive(Debug, Error)]
pub enum PaymentRepositoryError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn save(&self, payment: &Payment) -> Result<(), PaymentRepositoryError>;

    async fn get(&self, owner: &UserId, id: &PaymentId) -> Result<Option<Payment>, PaymentRepositoryError>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, PaymentRepositoryError>;

    async fn list_for_invoice(
        &self,
        owner: &UserId,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<Payment>, PaymentRepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPaymentRepository {
    store: InMemoryOwnedStore<Payment>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<(), PaymentRepositoryError> {
        self.store.upsert(payment.clone());
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &PaymentId) -> Result<Option<Payment>, PaymentRepositoryError> {
        Ok(self.store.get(owner, id))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, PaymentRepositoryError> {
        Ok(self.store.find_all(|p| p.reference == reference).into_iter().next())
    }

    async fn list_for_invoice(
        &self,
        owner: &UserId,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<Payment>, PaymentRepositoryError> {
        let mut payments: Vec<_> = self
            .store
            .list(owner)
            .into_iter()
            .filter(|p| &p.invoice_id == invoice_id)
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}
