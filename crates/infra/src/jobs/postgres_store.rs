//! Postgres-backed job store.
//!
//! The full [`Job`] is kept as JSON in `data`; `status` and `ready_at` are
//! projected into columns so claiming can use an index. Claims take a row
//! lock with `FOR UPDATE SKIP LOCKED`, so several executors can share one
//! table without handing the same job out twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use super::store::{JobStats, JobStore, JobStoreError};
use super::types::{DeadLetterEntry, Job, JobId, JobStatus};
use crate::db::{describe, is_unique_violation};

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, JobStoreError> {
        self.pool.begin().await.map_err(|e| storage(operation, e))
    }
}

fn storage(operation: &str, err: sqlx::Error) -> JobStoreError {
    JobStoreError::Storage(describe(operation, &err))
}

fn ready_at(job: &Job) -> DateTime<Utc> {
    job.scheduled_at.unwrap_or(job.created_at)
}

fn job_from_row(row: &sqlx::postgres::PgRow, operation: &str) -> Result<Job, JobStoreError> {
    let Json(job): Json<Job> = row.try_get("data").map_err(|e| storage(operation, e))?;
    Ok(job)
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, kind = %job.kind), err)]
    async fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, status, ready_at, created_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(job.id.0)
        .bind(job.kind.as_str())
        .bind(job.status.name())
        .bind(ready_at(&job))
        .bind(job.created_at)
        .bind(Json(&job))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                JobStoreError::AlreadyExists(job.id)
            } else {
                storage("enqueue_job", e)
            }
        })?;
        Ok(job.id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(
            r#"
            SELECT data FROM jobs WHERE id = $1
            UNION ALL
            SELECT data FROM dead_letters WHERE job_id = $1
            LIMIT 1
            "#,
        )
        .bind(job_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("get_job", e))?;

        row.as_ref().map(|r| job_from_row(r, "decode_job")).transpose()
    }

    async fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let result = sqlx::query("UPDATE jobs SET status = $2, ready_at = $3, data = $4 WHERE id = $1")
            .bind(job.id.0)
            .bind(job.status.name())
            .bind(ready_at(job))
            .bind(Json(job))
            .execute(&self.pool)
            .await
            .map_err(|e| storage("update_job", e))?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(job.id));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut tx = self.begin("claim_job").await?;

        let row = sqlx::query(
            r#"
            SELECT data FROM jobs
            WHERE status IN ('pending', 'failed') AND ready_at <= NOW()
            ORDER BY ready_at, created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| storage("claim_job", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut job = job_from_row(&row, "decode_job")?;
        job.mark_running();

        sqlx::query("UPDATE jobs SET status = $2, data = $3 WHERE id = $1")
            .bind(job.id.0)
            .bind(job.status.name())
            .bind(Json(&job))
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("claim_job", e))?;

        tx.commit().await.map_err(|e| storage("claim_job", e))?;
        Ok(Some(job))
    }

    async fn list_by_status(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM jobs
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(status.as_ref().map(JobStatus::name))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("list_jobs", e))?;

        rows.iter().map(|r| job_from_row(r, "decode_job")).collect()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), JobStoreError> {
        job.status = JobStatus::DeadLettered {
            error: reason.clone(),
            attempts: job.attempt,
        };
        job.updated_at = Utc::now();
        let entry = DeadLetterEntry::new(job, reason);

        let mut tx = self.begin("dead_letter_job").await?;
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(entry.job.id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("dead_letter_job", e))?;
        sqlx::query(
            r#"
            INSERT INTO dead_letters (job_id, reason, dead_lettered_at, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id) DO UPDATE SET
                reason = EXCLUDED.reason,
                dead_lettered_at = EXCLUDED.dead_lettered_at,
                data = EXCLUDED.data
            "#,
        )
        .bind(entry.job.id.0)
        .bind(&entry.reason)
        .bind(entry.dead_lettered_at)
        .bind(Json(&entry.job))
        .execute(&mut *tx)
        .await
        .map_err(|e| storage("dead_letter_job", e))?;
        tx.commit().await.map_err(|e| storage("dead_letter_job", e))
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let rows = sqlx::query(
            "SELECT reason, dead_lettered_at, data FROM dead_letters ORDER BY dead_lettered_at LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("list_dead_letters", e))?;

        rows.iter()
            .map(|row| {
                Ok(DeadLetterEntry {
                    job: job_from_row(row, "decode_dead_letter")?,
                    reason: row.try_get("reason").map_err(|e| storage("decode_dead_letter", e))?,
                    dead_lettered_at: row
                        .try_get("dead_lettered_at")
                        .map_err(|e| storage("decode_dead_letter", e))?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn retry_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut tx = self.begin("retry_dead_letter").await?;

        let row = sqlx::query("DELETE FROM dead_letters WHERE job_id = $1 RETURNING data")
            .bind(job_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| storage("retry_dead_letter", e))?
            .ok_or(JobStoreError::NotFound(job_id))?;

        let mut job = job_from_row(&row, "decode_dead_letter")?;
        job.status = JobStatus::Pending;
        job.attempt = 0;
        job.scheduled_at = None;
        job.updated_at = Utc::now();
        job.history.clear();

        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, status, ready_at, created_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(job.id.0)
        .bind(job.kind.as_str())
        .bind(job.status.name())
        .bind(job.updated_at)
        .bind(job.created_at)
        .bind(Json(&job))
        .execute(&mut *tx)
        .await
        .map_err(|e| storage("retry_dead_letter", e))?;

        tx.commit().await.map_err(|e| storage("retry_dead_letter", e))?;
        Ok(job)
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("job_stats", e))?;
        let dead: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage("job_stats", e))?;

        let mut stats = JobStats::default();
        for row in &rows {
            let status: String = row.try_get("status").map_err(|e| storage("job_stats", e))?;
            let n: i64 = row.try_get("n").map_err(|e| storage("job_stats", e))?;
            let n = n.max(0) as usize;
            match status.as_str() {
                "pending" => stats.pending += n,
                "running" => stats.running += n,
                "completed" => stats.completed += n,
                "failed" => stats.failed += n,
                "dead_lettered" => stats.dead_lettered += n,
                "cancelled" => stats.cancelled += n,
                other => tracing::warn!(status = other, "unknown job status in store"),
            }
        }
        stats.dead_lettered += dead.max(0) as usize;
        Ok(stats)
    }

    #[instrument(skip(self), err)]
    async fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, JobStoreError> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE status = 'completed' AND (data->>'updated_at')::timestamptz <= $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("purge_jobs", e))?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[tokio::test]
    async fn claims_and_dead_letters_when_a_database_is_available() {
        let Some(pool) = test_support::pool().await else {
            return;
        };
        sqlx::query("DELETE FROM jobs").execute(&pool).await.unwrap();
        let store = PostgresJobStore::new(pool);

        let job = Job::new("test.postgres", serde_json::json!({"n": 1}));
        let id = store.enqueue(job.clone()).await.unwrap();
        assert!(matches!(store.enqueue(job).await, Err(JobStoreError::AlreadyExists(_))));

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.attempt, 1);
        assert!(store.claim_next().await.unwrap().is_none());

        store.dead_letter(claimed, "gave up".into()).await.unwrap();
        assert!(matches!(
            store.get(id).await.unwrap().unwrap().status,
            JobStatus::DeadLettered { .. }
        ));

        let retried = store.retry_dead_letter(id).await.unwrap();
        assert_eq!(retried.attempt, 0);
        assert_eq!(store.stats().await.unwrap().pending, 1);

        let mut claimed = store.claim_next().await.unwrap().unwrap();
        claimed.mark_completed(Utc::now());
        store.update(&claimed).await.unwrap();
        assert!(store.get(id).await.unwrap().unwrap().payload.is_null());

        let purged = store
            .purge_completed(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(id).await.unwrap().is_none());
    }
}
