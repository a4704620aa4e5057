use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use kluster_core::{InvoiceId, Money, PaymentId, UserId};
use kluster_payments::{Payment, PaymentRepository, PaymentRepositoryError, PaymentStatus};

use super::{decode_column, describe};

#[derive(Debug, Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(operation: &str, err: sqlx::Error) -> PaymentRepositoryError {
    PaymentRepositoryError::Backend(describe(operation, &err))
}

fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let invoice_id: String = row.try_get("invoice_id")?;
    let business_id: String = row.try_get("business_id")?;
    let status: String = row.try_get("status")?;
    let amount_minor: i64 = row.try_get("amount_minor")?;

    Ok(Payment {
        id: decode_column::<PaymentId>("id", &id)?,
        invoice_id: decode_column::<InvoiceId>("invoice_id", &invoice_id)?,
        business_id: decode_column::<UserId>("business_id", &business_id)?,
        reference: row.try_get("reference")?,
        amount: Money::from_minor(amount_minor),
        email: row.try_get("email")?,
        status: decode_column::<PaymentStatus>("status", &status)?,
        authorization_url: row.try_get("authorization_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<(), PaymentRepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, business_id, reference, amount_minor, email,
                status, authorization_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                authorization_url = EXCLUDED.authorization_url,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(payment.id.as_str())
        .bind(payment.invoice_id.as_str())
        .bind(payment.business_id.as_str())
        .bind(&payment.reference)
        .bind(payment.amount.minor_units())
        .bind(&payment.email)
        .bind(payment.status.as_str())
        .bind(&payment.authorization_url)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend("save_payment", e))?;
        Ok(())
    }

    async fn get(&self, owner: &UserId, id: &PaymentId) -> Result<Option<Payment>, PaymentRepositoryError> {
        let row = sqlx::query("SELECT * FROM payments WHERE business_id = $1 AND id = $2")
            .bind(owner.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("get_payment", e))?;
        row.as_ref()
            .map(payment_from_row)
            .transpose()
            .map_err(|e| backend("decode_payment", e))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, PaymentRepositoryError> {
        let row = sqlx::query("SELECT * FROM payments WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("find_payment_by_reference", e))?;
        row.as_ref()
            .map(payment_from_row)
            .transpose()
            .map_err(|e| backend("decode_payment", e))
    }

    async fn list_for_invoice(
        &self,
        owner: &UserId,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<Payment>, PaymentRepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM payments WHERE business_id = $1 AND invoice_id = $2 ORDER BY created_at",
        )
        .bind(owner.as_str())
        .bind(invoice_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("list_payments_for_invoice", e))?;

        rows.iter()
            .map(payment_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| backend("decode_payment", e))
    }
}
