//! Job storage abstraction and the in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{DeadLetterEntry, Job, JobId, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    async fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the oldest ready job and mark it running.
    async fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    async fn list_by_status(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, JobStoreError>;

    /// Remove `job` from the queue and keep it for inspection.
    async fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError>;

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    /// Move a dead-lettered job back to pending with a fresh attempt count.
    async fn retry_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    async fn stats(&self) -> Result<JobStats, JobStoreError>;

    /// Delete completed jobs last touched at or before `before`. Returns how many went.
    async fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, JobStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub cancelled: usize,
}

impl JobStats {
    pub(crate) fn count(&mut self, status: &JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed { .. } => self.failed += 1,
            JobStatus::DeadLettered { .. } => self.dead_lettered += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}

fn poisoned() -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".into())
}

/// In-memory job store for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    dead_letters: RwLock<HashMap<JobId, DeadLetterEntry>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        if let Some(job) = jobs.get(&job_id) {
            return Ok(Some(job.clone()));
        }
        let dls = self.dead_letters.read().map_err(|_| poisoned())?;
        Ok(dls.get(&job_id).map(|e| e.job.clone()))
    }

    async fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(JobStoreError::NotFound(job.id)),
        }
    }

    async fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let now = Utc::now();

        let next = jobs
            .values()
            .filter(|j| j.is_claimable(now))
            .min_by_key(|j| (j.scheduled_at.unwrap_or(j.created_at), j.created_at))
            .map(|j| j.id);

        Ok(next.and_then(|id| {
            jobs.get_mut(&id).map(|job| {
                job.mark_running();
                job.clone()
            })
        }))
    }

    async fn list_by_status(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| status.as_ref().is_none_or(|s| j.status.same_state(s)))
            .cloned()
            .collect();

        result.sort_by_key(|j| j.created_at);
        result.truncate(limit);
        Ok(result)
    }

    async fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let mut dls = self.dead_letters.write().map_err(|_| poisoned())?;

        job.status = JobStatus::DeadLettered {
            error: reason.clone(),
            attempts: job.attempt,
        };
        job.updated_at = Utc::now();

        jobs.remove(&job.id);
        dls.insert(job.id, DeadLetterEntry::new(job, reason));
        Ok(())
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let dls = self.dead_letters.read().map_err(|_| poisoned())?;
        let mut result: Vec<_> = dls.values().cloned().collect();
        result.sort_by_key(|e| e.dead_lettered_at);
        result.truncate(limit);
        Ok(result)
    }

    async fn retry_dead_letter(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let mut dls = self.dead_letters.write().map_err(|_| poisoned())?;

        let entry = dls.remove(&job_id).ok_or(JobStoreError::NotFound(job_id))?;

        let mut job = entry.job;
        job.status = JobStatus::Pending;
        job.attempt = 0;
        job.scheduled_at = None;
        job.updated_at = Utc::now();
        job.history.clear();

        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        let dls = self.dead_letters.read().map_err(|_| poisoned())?;

        let mut stats = JobStats::default();
        for job in jobs.values() {
            stats.count(&job.status);
        }
        stats.dead_lettered += dls.len();
        Ok(stats)
    }

    async fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let count = jobs.len();
        jobs.retain(|_, job| !(job.status == JobStatus::Completed && job.updated_at <= before));
        Ok(count - jobs.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn enqueue_and_claim() {
        let store = InMemoryJobStore::new();
        let job_id = store.enqueue(Job::new("test", serde_json::json!({}))).await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempt, 1);

        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_jobs_wait_their_turn() {
        let store = InMemoryJobStore::new();
        store
            .enqueue(Job::new("later", serde_json::json!({})).delayed(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(store.claim_next().await.unwrap().is_none());

        let now_id = store.enqueue(Job::new("now", serde_json::json!({}))).await.unwrap();
        assert_eq!(store.claim_next().await.unwrap().unwrap().id, now_id);
    }

    #[tokio::test]
    async fn dead_letter_flow() {
        let store = InMemoryJobStore::new();
        let job = Job::new("test", serde_json::json!({}));
        let job_id = job.id;
        store.enqueue(job).await.unwrap();

        let mut claimed = store.claim_next().await.unwrap().unwrap();
        claimed.mark_failed("test error".to_string(), Utc::now());
        store.dead_letter(claimed, "max retries exceeded".to_string()).await.unwrap();

        assert_eq!(store.list_by_status(None, 10).await.unwrap().len(), 0);
        let dls = store.list_dead_letters(10).await.unwrap();
        assert_eq!(dls.len(), 1);
        assert_eq!(dls[0].job.id, job_id);
        assert_eq!(store.stats().await.unwrap().dead_lettered, 1);

        let retried = store.retry_dead_letter(job_id).await.unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.attempt, 0);
        assert!(store.list_dead_letters(10).await.unwrap().is_empty());
        assert!(matches!(
            store.retry_dead_letter(job_id).await,
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stats_tracking() {
        let store = InMemoryJobStore::new();
        for i in 0..5 {
            store.enqueue(Job::new("test", serde_json::json!({"i": i}))).await.unwrap();
        }
        assert_eq!(store.stats().await.unwrap().pending, 5);

        store.claim_next().await.unwrap();
        store.claim_next().await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.running, 2);
        assert_eq!(
            store.list_by_status(Some(JobStatus::Running), 10).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn purge_removes_only_old_completed_jobs() {
        let store = InMemoryJobStore::new();
        let done = store.enqueue(Job::new("done", serde_json::json!({}))).await.unwrap();
        let waiting = store.enqueue(Job::new("waiting", serde_json::json!({})).delayed(Duration::from_secs(60))).await.unwrap();

        let mut claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, done);
        claimed.mark_completed(Utc::now());
        store.update(&claimed).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.purge_completed(past).await.unwrap(), 0);
        assert!(store.get(done).await.unwrap().is_some());

        let future = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.purge_completed(future).await.unwrap(), 1);
        assert!(store.get(done).await.unwrap().is_none());
        assert!(store.get(waiting).await.unwrap().is_some());
    }
}
