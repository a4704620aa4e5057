//! Enqueue-side facade over a [`JobStore`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use kluster_notifications::{JobQueue, QueueError};

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobId, JobKind, RetryPolicy};

#[derive(Clone)]
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    retry_policy: RetryPolicy,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn enqueue(&self, kind: impl Into<JobKind>, payload: serde_json::Value) -> Result<JobId, JobStoreError> {
        self.submit(Job::new(kind, payload)).await
    }

    pub async fn schedule(
        &self,
        kind: impl Into<JobKind>,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<JobId, JobStoreError> {
        self.submit(Job::new(kind, payload).delayed(delay)).await
    }

    async fn submit(&self, job: Job) -> Result<JobId, JobStoreError> {
        let job = job.with_retry_policy(self.retry_policy.clone());
        let (id, kind) = (job.id, job.kind.clone());
        self.store.enqueue(job).await?;
        tracing::debug!(job_id = %id, kind = %kind, "job enqueued");
        Ok(id)
    }

    /// Enqueue `kind` now and then every `interval` until the handle is stopped.
    pub fn every(&self, kind: impl Into<JobKind>, interval: Duration) -> RecurringJobHandle {
        let kind = kind.into();
        let scheduler = self.clone();
        let (tx, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = scheduler.enqueue(kind.clone(), serde_json::json!({})).await {
                            tracing::error!(kind = %kind, error = %err, "failed to enqueue recurring job");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        RecurringJobHandle { shutdown: tx, task }
    }
}

#[derive(Debug)]
pub struct RecurringJobHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RecurringJobHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[async_trait]
impl JobQueue for JobScheduler {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<(), QueueError> {
        JobScheduler::enqueue(self, kind, payload)
            .await
            .map(|_| ())
            .map_err(|err| QueueError::Store(err.to_string()))
    }
}
