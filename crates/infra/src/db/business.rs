use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use kluster_business::{
    Client, ClientRepository, Invoice, InvoiceItem, InvoiceRepository, InvoiceStatus, Product, ProductRepository,
    RepositoryError,
};
use kluster_core::{ClientId, InvoiceId, Money, ProductId, UserId};

use super::{decode_column, describe, is_unique_violation};

fn backend(operation: &str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(describe(operation, &err))
}

fn decode_all<T>(rows: &[PgRow], decode: fn(&PgRow) -> Result<T, sqlx::Error>, operation: &str) -> Result<Vec<T>, RepositoryError> {
    rows.iter()
        .map(decode)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| backend(operation, e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Clients
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresClientRepository {
    pool: PgPool,
}

impl PostgresClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn client_from_row(row: &PgRow) -> Result<Client, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let business_id: String = row.try_get("business_id")?;
    Ok(Client {
        id: decode_column::<ClientId>("id", &id)?,
        business_id: decode_column::<UserId>("business_id", &business_id)?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email_address: row.try_get("email_address")?,
        address: row.try_get("address")?,
        phone_number: row.try_get("phone_number")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ClientRepository for PostgresClientRepository {
    async fn save(&self, client: &Client) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO clients (
                id, business_id, first_name, last_name, email_address,
                address, phone_number, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email_address = EXCLUDED.email_address,
                address = EXCLUDED.address,
                phone_number = EXCLUDED.phone_number,
                updated_at = EXCLUDED.updated_at
            WHERE clients.business_id = EXCLUDED.business_id
            "#,
        )
        .bind(client.id.as_str())
        .bind(client.business_id.as_str())
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email_address)
        .bind(&client.address)
        .bind(&client.phone_number)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Duplicate(describe("save_client", &e))
            } else {
                backend("save_client", e)
            }
        })?;
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM clients WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("get_client", e))?;
        row.as_ref()
            .map(client_from_row)
            .transpose()
            .map_err(|e| backend("decode_client", e))
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM clients WHERE business_id = $1 ORDER BY created_at DESC")
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend("list_clients", e))?;
        decode_all(&rows, client_from_row, "decode_client")
    }

    async fn find_by_email(&self, owner: &UserId, email: &str) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM clients WHERE business_id = $1 AND lower(email_address) = lower($2)")
            .bind(owner.as_str())
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("find_client_by_email", e))?;
        row.as_ref()
            .map(client_from_row)
            .transpose()
            .map_err(|e| backend("decode_client", e))
    }

    async fn delete(&self, owner: &UserId, id: &ClientId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM clients WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| backend("delete_client", e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Products
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let business_id: String = row.try_get("business_id")?;
    let price_minor: i64 = row.try_get("price_minor")?;
    Ok(Product {
        id: decode_column::<ProductId>("id", &id)?,
        business_id: decode_column::<UserId>("business_id", &business_id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_minor(price_minor),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, business_id, name, description, price_minor, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price_minor = EXCLUDED.price_minor,
                updated_at = EXCLUDED.updated_at
            WHERE products.business_id = EXCLUDED.business_id
            "#,
        )
        .bind(product.id.as_str())
        .bind(product.business_id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.minor_units())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend("save_product", e))?;
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM products WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("get_product", e))?;
        row.as_ref()
            .map(product_from_row)
            .transpose()
            .map_err(|e| backend("decode_product", e))
    }

    async fn list(&self, owner: &UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM products WHERE business_id = $1 ORDER BY created_at DESC")
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend("list_products", e))?;
        decode_all(&rows, product_from_row, "decode_product")
    }

    async fn delete(&self, owner: &UserId, id: &ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| backend("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invoices
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn invoice_from_row(row: &PgRow) -> Result<Invoice, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let business_id: String = row.try_get("business_id")?;
    let client_id: String = row.try_get("client_id")?;
    let status: String = row.try_get("status")?;
    let Json(items): Json<Vec<InvoiceItem>> = row.try_get("items")?;
    let total_minor: i64 = row.try_get("total_minor")?;
    Ok(Invoice {
        id: decode_column::<InvoiceId>("id", &id)?,
        business_id: decode_column::<UserId>("business_id", &business_id)?,
        client_id: decode_column::<ClientId>("client_id", &client_id)?,
        items,
        due_date: row.try_get("due_date")?,
        status: decode_column::<InvoiceStatus>("status", &status)?,
        total: Money::from_minor(total_minor),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn save(&self, invoice: &Invoice) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, business_id, client_id, items, due_date, status,
                total_minor, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                client_id = EXCLUDED.client_id,
                items = EXCLUDED.items,
                due_date = EXCLUDED.due_date,
                status = EXCLUDED.status,
                total_minor = EXCLUDED.total_minor,
                updated_at = EXCLUDED.updated_at
            WHERE invoices.business_id = EXCLUDED.business_id
            "#,
        )
        .bind(invoice.id.as_str())
        .bind(invoice.business_id.as_str())
        .bind(invoice.client_id.as_str())
        .bind(Json(&invoice.items))
        .bind(invoice.due_date)
        .bind(invoice.status.as_str())
        .bind(invoice.total.minor_units())
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend("save_invoice", e))?;
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM invoices WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("get_invoice", e))?;
        row.as_ref()
            .map(invoice_from_row)
            .transpose()
            .map_err(|e| backend("decode_invoice", e))
    }

    async fn get_any(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM invoices WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("get_any_invoice", e))?;
        row.as_ref()
            .map(invoice_from_row)
            .transpose()
            .map_err(|e| backend("decode_invoice", e))
    }

    async fn list(&self, owner: &UserId, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM invoices
            WHERE business_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner.as_str())
        .bind(status.map(InvoiceStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("list_invoices", e))?;
        decode_all(&rows, invoice_from_row, "decode_invoice")
    }

    async fn list_past_due(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM invoices WHERE status = $1 AND due_date < $2 ORDER BY due_date")
            .bind(InvoiceStatus::Pending.as_str())
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend("list_past_due_invoices", e))?;
        decode_all(&rows, invoice_from_row, "decode_invoice")
    }

    async fn delete(&self, owner: &UserId, id: &InvoiceId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM invoices WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| backend("delete_invoice", e))?;
        Ok(result.rows_affected() > 0)
    }
}
