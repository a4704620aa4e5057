//! Postgres adapters: pool, schema bootstrap and repositories.
//!
//! Identifiers are stored as their prefixed text form. Money is stored in
//! minor units (`BIGINT`). Invoice items and job bodies are `JSONB`.

use std::time::Duration;

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod business;
pub mod payments;
pub mod users;

pub use business::{PostgresClientRepository, PostgresInvoiceRepository, PostgresProductRepository};
pub use payments::PostgresPaymentRepository;
pub use users::PostgresUserStore;

const SCHEMA: &str = include_str!("schema.sql");

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

/// `DatabaseSettings` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseSettings {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default = "default_max_connections", deserialize_with = "kluster_core::settings::from_text")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs", deserialize_with = "kluster_core::settings::from_text")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl DatabaseSettings {
    pub fn is_configured(&self) -> bool {
        !self.connection_string.trim().is_empty()
    }
}

pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(&settings.connection_string)
        .await
}

/// Create missing tables and indexes.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("database schema ensured");
    Ok(())
}

pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Describe a sqlx failure for a backend error variant.
pub(crate) fn describe(operation: &str, err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("database error in {operation} ({code}): {}", db_err.message()),
            None => format!("database error in {operation}: {}", db_err.message()),
        },
        sqlx::Error::PoolClosed => format!("connection pool closed in {operation}"),
        sqlx::Error::PoolTimedOut => format!("timed out acquiring a connection in {operation}"),
        other => format!("sqlx error in {operation}: {other}"),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Parse a stored column that must round-trip through `FromStr`.
pub(crate) fn decode_column<T>(column: &str, raw: &str) -> Result<T, sqlx::Error>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.to_string().into(),
    })
}
