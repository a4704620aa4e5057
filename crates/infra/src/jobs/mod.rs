//! Background jobs with retry, backoff and dead-letter handling.
//!
//! - `Job`: kind, JSON payload and retry bookkeeping
//! - `JobStore`: persistence (in-memory or Postgres)
//! - `JobExecutor`: claims ready jobs and routes them to handlers by kind
//! - `JobScheduler`: enqueue-side facade, also used as the notifications `JobQueue`
//!
//! Jobs that exhaust their retry policy are moved to the dead-letter list,
//! where they can be inspected and requeued.

pub mod executor;
pub mod postgres_store;
pub mod scheduler;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler, Outcome};
pub use postgres_store::PostgresJobStore;
pub use scheduler::{JobScheduler, RecurringJobHandle};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{BackoffStrategy, DeadLetterEntry, Job, JobId, JobKind, JobResult, JobStatus, RetryPolicy};
