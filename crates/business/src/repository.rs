//! Owner-scoped repositories for the business module.
//!
//! Every lookup takes the owning business id; another owner's records are
//! indistinguishable from missing ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use kluster_core::{ClientId, InMemoryOwnedStore, InvoiceId, ProductId, UserId};

use crate::client::Client;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::product::Product;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Insert or replace.
    async fn save(&self, client: &Client) -> Result<(), RepositoryError>;

    async fn get(&self, owner: &UserId, id: &ClientId) -> Result<Option<Client>, RepositoryError>;

    async fn list(&self, owner: &UserId) -> Result<Vec<Client>, RepositoryError>;

    async fn find_by_email(&self, owner: &UserId, email: &str) -> Result<Option<Client>, RepositoryError>;

    async fn delete(&self, owner: &UserId, id: &ClientId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn save(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn get(&self, owner: &UserId, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list(&self, owner: &UserId) -> Result<Vec<Product>, RepositoryError>;

    async fn delete(&self, owner: &UserId, id: &ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn save(&self, invoice: &Invoice) -> Result<(), RepositoryError>;

    async fn get(&self, owner: &UserId, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;

    /// Lookup without an owner, for internal consumers (payment completion).
    async fn get_any(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;

    async fn list(&self, owner: &UserId, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>, RepositoryError>;

    /// Pending invoices whose due date is before `now`, across all owners.
    async fn list_past_due(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, RepositoryError>;

    async fn delete(&self, owner: &UserId, id: &InvoiceId) -> Result<bool, RepositoryError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementations (dev/test)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryClientRepository {
    store: InMemoryOwnedStore<Client>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn save(&self, client: &Client) -> Result<(), RepositoryError> {
        self.store.upsert(client.clone());
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        Ok(self.store.get(owner, id))
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Client>, RepositoryError> {
        Ok(newest_first(self.store.list(owner), |c| c.created_at))
    }

    async fn find_by_email(&self, owner: &UserId, email: &str) -> Result<Option<Client>, RepositoryError> {
        Ok(self.store.list(owner).into_iter().find(|c| c.has_email(email)))
    }

    async fn delete(&self, owner: &UserId, id: &ClientId) -> Result<bool, RepositoryError> {
        Ok(self.store.remove(owner, id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    store: InMemoryOwnedStore<Product>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        self.store.upsert(product.clone());
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.store.get(owner, id))
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Product>, RepositoryError> {
        Ok(newest_first(self.store.list(owner), |p| p.created_at))
    }

    async fn delete(&self, owner: &UserId, id: &ProductId) -> Result<bool, RepositoryError> {
        Ok(self.store.remove(owner, id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    store: InMemoryOwnedStore<Invoice>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn save(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        self.store.upsert(invoice.clone());
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        Ok(self.store.get(owner, id))
    }

    async fn get_any(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        Ok(self.store.get_any(id))
    }

    async fn list(&self, owner: &UserId, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>, RepositoryError> {
        let items = self
            .store
            .list(owner)
            .into_iter()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .collect();
        Ok(newest_first(items, |i| i.created_at))
    }

    async fn list_past_due(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, RepositoryError> {
        Ok(self.store.find_all(|i| i.is_past_due(now)))
    }

    async fn delete(&self, owner: &UserId, id: &InvoiceId) -> Result<bool, RepositoryError> {
        Ok(self.store.remove(owner, id))
    }
}
