//! Job executor with retry and backoff logic.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::store::JobStore;
use super::types::{Job, JobKind, JobResult, JobStatus};

/// Runs one kind of job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> JobResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = JobResult> + Send,
{
    async fn handle(&self, job: &Job) -> JobResult {
        (self.0)(job.clone()).await
    }
}

const PURGE_EVERY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    pub poll_interval: Duration,
    pub name: String,
    /// Completed jobs older than this are deleted from the store.
    pub completed_retention: Duration,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            name: "job-executor".to_string(),
            completed_retention: Duration::from_secs(3600),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_completed_retention(mut self, retention: Duration) -> Self {
        self.completed_retention = retention;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub uptime_secs: u64,
}

/// Handle to a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Stop polling and wait for the in-flight job to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            error!(error = %err, "job executor task ended abnormally");
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// How a single execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Retrying,
    DeadLettered,
}

/// Polls a job store and runs claimed jobs with the registered handlers.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for a kind pattern: an exact kind, `prefix.*` or `*`.
    pub fn register(&mut self, pattern: impl Into<String>, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(pattern.into(), handler);
        self
    }

    pub fn register_fn<F, Fut>(&mut self, pattern: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        self.register(pattern, Arc::new(FnHandler(handler)))
    }

    fn handler_for(&self, kind: &JobKind) -> Option<&Arc<dyn JobHandler>> {
        let kind = kind.as_str();
        if let Some(h) = self.handlers.get(kind) {
            return Some(h);
        }

        // Longest matching prefix wins.
        let category = self
            .handlers
            .iter()
            .filter_map(|(pattern, handler)| {
                let prefix = pattern.strip_suffix(".*")?;
                let rest = kind.strip_prefix(prefix)?;
                rest.starts_with('.').then_some((prefix.len(), handler))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, handler)| handler);

        category.or_else(|| self.handlers.get("*"))
    }

    /// Run one claimed job and persist the result.
    pub async fn execute(&self, job: &mut Job) -> Outcome {
        let started = Utc::now();

        let result = match self.handler_for(&job.kind) {
            Some(handler) => handler.handle(job).await,
            None => {
                warn!(job_id = %job.id, kind = %job.kind, "no handler for job");
                JobResult::Failure(format!("no handler for job kind: {}", job.kind))
            }
        };

        let outcome = match result {
            JobResult::Success => {
                job.mark_completed(started);
                debug!(job_id = %job.id, kind = %job.kind, "job completed");
                Outcome::Succeeded
            }
            JobResult::Failure(error) => {
                job.mark_failed(error, started);
                self.failure_outcome(job)
            }
            JobResult::RetryAfter(delay) => {
                job.mark_failed_with_delay("retry requested".to_string(), started, delay);
                self.failure_outcome(job)
            }
        };

        let persisted = match (&outcome, &job.status) {
            (Outcome::DeadLettered, JobStatus::DeadLettered { error, .. }) => {
                self.store.dead_letter(job.clone(), error.clone()).await
            }
            _ => self.store.update(job).await,
        };
        if let Err(err) = persisted {
            error!(job_id = %job.id, error = %err, "failed to persist job result");
        }
        outcome
    }

    fn failure_outcome(&self, job: &Job) -> Outcome {
        match &job.status {
            JobStatus::DeadLettered { error, attempts } => {
                warn!(job_id = %job.id, kind = %job.kind, attempts, error = %error, "job dead-lettered");
                Outcome::DeadLettered
            }
            status => {
                debug!(job_id = %job.id, kind = %job.kind, status = ?status, next = ?job.scheduled_at, "job will be retried");
                Outcome::Retrying
            }
        }
    }

    /// Claim and run jobs until the store is empty. Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.store.claim_next().await {
                Ok(Some(mut job)) => {
                    self.execute(&mut job).await;
                    ran += 1;
                }
                Ok(None) => return ran,
                Err(err) => {
                    error!(error = %err, "failed to claim job");
                    return ran;
                }
            }
        }
    }

    /// Delete completed jobs that finished more than `retention` ago.
    pub async fn purge_completed(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap_or_default();
        match self.store.purge_completed(cutoff).await {
            Ok(purged) => {
                if purged > 0 {
                    debug!(purged, "completed jobs purged");
                }
                purged
            }
            Err(err) => {
                error!(error = %err, "failed to purge completed jobs");
                0
            }
        }
    }

    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let task = tokio::spawn(executor_loop(self, config, shutdown_rx, stats.clone()));

        JobExecutorHandle {
            shutdown: shutdown_tx,
            task,
            stats,
        }
    }
}

fn record(stats: &Mutex<ExecutorStats>, f: impl FnOnce(&mut ExecutorStats)) {
    if let Ok(mut s) = stats.lock() {
        f(&mut s);
    }
}

async fn executor_loop(
    executor: JobExecutor,
    config: JobExecutorConfig,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    info!(executor = %config.name, handlers = ?executor.handlers.keys().collect::<Vec<_>>(), "job executor started");
    let start_time = Instant::now();
    let mut last_purge: Option<Instant> = None;

    loop {
        if *shutdown.borrow() {
            break;
        }
        record(&stats, |s| s.uptime_secs = start_time.elapsed().as_secs());

        match executor.store.claim_next().await {
            Ok(Some(mut job)) => {
                debug!(executor = %config.name, job_id = %job.id, kind = %job.kind, attempt = job.attempt, "claimed job");
                let outcome = executor.execute(&mut job).await;
                record(&stats, |s| {
                    s.jobs_processed += 1;
                    match outcome {
                        Outcome::Succeeded => s.jobs_succeeded += 1,
                        Outcome::Retrying => s.jobs_failed += 1,
                        Outcome::DeadLettered => {
                            s.jobs_failed += 1;
                            s.jobs_dead_lettered += 1;
                        }
                    }
                });
                continue;
            }
            Ok(None) => {
                if last_purge.is_none_or(|at| at.elapsed() >= PURGE_EVERY) {
                    executor.purge_completed(config.completed_retention).await;
                    last_purge = Some(Instant::now());
                }
            }
            Err(err) => error!(executor = %config.name, error = %err, "failed to claim job"),
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(executor = %config.name, "job executor stopped");
}
