use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use kluster_core::{Role, UserId};
use kluster_users::user::normalize_email;
use kluster_users::{ApplicationUser, PendingOtp, UserStore, UserStoreError};

use super::{decode_column, describe, is_unique_violation};

const COLUMNS: &str = r#"
    id, first_name, last_name, email, phone_number, role, password_hash,
    email_confirmed, lockout_enabled, access_failed_count, lockout_end,
    otp_hash, otp_expires_at, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(operation: &str, err: sqlx::Error) -> UserStoreError {
    UserStoreError::Backend(describe(operation, &err))
}

fn user_from_row(row: &PgRow) -> Result<ApplicationUser, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let role: String = row.try_get("role")?;
    let otp_hash: Option<String> = row.try_get("otp_hash")?;
    let otp_expires_at: Option<DateTime<Utc>> = row.try_get("otp_expires_at")?;
    let access_failed_count: i32 = row.try_get("access_failed_count")?;

    Ok(ApplicationUser {
        id: decode_column::<UserId>("id", &id)?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        role: decode_column::<Role>("role", &role)?,
        password_hash: row.try_get("password_hash")?,
        email_confirmed: row.try_get("email_confirmed")?,
        lockout_enabled: row.try_get("lockout_enabled")?,
        access_failed_count: access_failed_count.max(0) as u32,
        lockout_end: row.try_get("lockout_end")?,
        pending_otp: match (otp_hash, otp_expires_at) {
            (Some(code_hash), Some(expires_at)) => Some(PendingOtp { code_hash, expires_at }),
            _ => None,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn insert(&self, user: &ApplicationUser) -> Result<(), UserStoreError> {
        let otp = user.pending_otp.as_ref();
        sqlx::query(&format!(
            "INSERT INTO users ({COLUMNS}, normalized_email)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(user.id.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.email_confirmed)
        .bind(user.lockout_enabled)
        .bind(user.access_failed_count as i32)
        .bind(user.lockout_end)
        .bind(otp.map(|o| o.code_hash.as_str()))
        .bind(otp.map(|o| o.expires_at))
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.normalized_email())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                UserStoreError::DuplicateEmail
            } else {
                backend("insert_user", e)
            }
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<ApplicationUser>, UserStoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("find_user_by_id", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| backend("decode_user", e))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationUser>, UserStoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM users WHERE normalized_email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("find_user_by_email", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| backend("decode_user", e))
    }

    async fn update(&self, user: &ApplicationUser) -> Result<(), UserStoreError> {
        let otp = user.pending_otp.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE users SET
                first_name = $2,
                last_name = $3,
                phone_number = $4,
                email_confirmed = $5,
                lockout_enabled = $6,
                access_failed_count = $7,
                lockout_end = $8,
                otp_hash = $9,
                otp_expires_at = $10,
                password_hash = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(user.email_confirmed)
        .bind(user.lockout_enabled)
        .bind(user.access_failed_count as i32)
        .bind(user.lockout_end)
        .bind(otp.map(|o| o.code_hash.as_str()))
        .bind(otp.map(|o| o.expires_at))
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kluster_users::LockoutPolicy;

    use super::*;
    use crate::db::test_support;

    #[tokio::test]
    async fn round_trips_users_when_a_database_is_available() {
        let Some(pool) = test_support::pool().await else {
            return;
        };
        let store = PostgresUserStore::new(pool);
        let email = format!("{}@example.com", UserId::new().as_str().to_lowercase());
        let mut user = ApplicationUser::new(
            "Ada",
            "Obi",
            email.clone(),
            None,
            Role::Business,
            "hash".into(),
            &LockoutPolicy::default(),
            Utc::now(),
        );
        store.insert(&user).await.unwrap();
        assert!(matches!(store.insert(&user).await, Err(UserStoreError::DuplicateEmail)));

        user.confirm_email(Utc::now());
        store.update(&user).await.unwrap();

        let loaded = store.find_by_email(&email.to_uppercase()).await.unwrap().unwrap();
        assert_eq!(loaded.id, user.id);
        assert!(loaded.email_confirmed);
    }
}
