//! Service wiring: picks adapters from [`AppSettings`] and starts the
//! background workers (bus host, job executor, overdue sweep).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sqlx::PgPool;

use kluster_business::{
    ClientRepository, ClientService, InMemoryClientRepository, InMemoryInvoiceRepository, InMemoryProductRepository,
    InvoicePaidConsumer, InvoiceRepository, InvoiceService, ProductRepository, ProductService,
};
use kluster_infra::config::{AppSettings, MessageBrokerSettings};
use kluster_infra::db::{
    self, PostgresClientRepository, PostgresInvoiceRepository, PostgresPaymentRepository, PostgresProductRepository,
    PostgresUserStore,
};
use kluster_infra::jobs::{
    InMemoryJobStore, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobKind, JobResult, JobScheduler, JobStats,
    JobStore, PostgresJobStore, RecurringJobHandle,
};
use kluster_messaging::{
    BusHost, BusHostHandle, ConsumerRegistry, InMemoryMessageBus, InvoiceCreated, MessageBus, MessageEnvelope,
    OtpRequested, PaymentCompleted, Publisher, UserRegistered,
};
use kluster_notifications::{
    HttpMailService, InvoiceMailConsumer, JobQueue, LogMailService, MailService, NotificationService,
    OtpMailConsumer, PaymentReceiptConsumer, TemplateStore, WelcomeMailConsumer,
};
use kluster_payments::{
    FakeGateway, InMemoryPaymentRepository, PaymentGateway, PaymentRepository, PaymentService, PaystackClient,
};
use kluster_users::{InMemoryUserStore, TokenService, UserService, UserStore};

/// Module services shared by every handler.
pub struct AppServices {
    pub users: UserService,
    pub clients: ClientService,
    pub products: ProductService,
    pub invoices: InvoiceService,
    pub payments: PaymentService,
    pub tokens: Arc<TokenService>,
    pub jobs: JobScheduler,
    pub database: Option<PgPool>,
}

impl AppServices {
    /// `(database, jobs)` for the health endpoint.
    pub async fn health(&self) -> (&'static str, Option<JobStats>) {
        let database = match &self.database {
            None => "in-memory",
            Some(pool) => match db::ping(pool).await {
                Ok(()) => "up",
                Err(err) => {
                    tracing::warn!(error = %err, "database ping failed");
                    "down"
                }
            },
        };

        let jobs = match self.jobs.store().stats().await {
            Ok(stats) => Some(stats),
            Err(err) => {
                tracing::warn!(error = %err, "job stats unavailable");
                None
            }
        };
        (database, jobs)
    }
}

/// Adapters supplied by the caller instead of being picked from settings.
#[derive(Default)]
pub struct Overrides {
    pub mail: Option<Arc<dyn MailService>>,
    pub gateway: Option<Arc<dyn PaymentGateway>>,
}

/// Handles to the workers started by [`build_services`].
pub struct Background {
    bus_host: BusHostHandle,
    executor: JobExecutorHandle,
    overdue_sweep: RecurringJobHandle,
}

impl Background {
    pub async fn shutdown(self) {
        self.overdue_sweep.stop().await;
        self.executor.shutdown().await;
        self.bus_host.shutdown().await;
        tracing::info!("background workers stopped");
    }
}

struct Storage {
    users: Arc<dyn UserStore>,
    clients: Arc<dyn ClientRepository>,
    products: Arc<dyn ProductRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    payments: Arc<dyn PaymentRepository>,
    jobs: Arc<dyn JobStore>,
    pool: Option<PgPool>,
}

impl Storage {
    async fn from_settings(settings: &AppSettings) -> anyhow::Result<Self> {
        if !settings.database.is_configured() {
            tracing::warn!("DatabaseSettings:ConnectionString is empty; using in-memory storage");
            return Ok(Self::in_memory());
        }

        let pool = db::connect(&settings.database)
            .await
            .context("failed to connect to postgres")?;
        db::ensure_schema(&pool).await.context("failed to create database schema")?;
        tracing::info!("using postgres storage");

        Ok(Self {
            users: Arc::new(PostgresUserStore::new(pool.clone())),
            clients: Arc::new(PostgresClientRepository::new(pool.clone())),
            products: Arc::new(PostgresProductRepository::new(pool.clone())),
            invoices: Arc::new(PostgresInvoiceRepository::new(pool.clone())),
            payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
            jobs: Arc::new(PostgresJobStore::new(pool.clone())),
            pool: Some(pool),
        })
    }

    fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            clients: Arc::new(InMemoryClientRepository::new()),
            products: Arc::new(InMemoryProductRepository::new()),
            invoices: Arc::new(InMemoryInvoiceRepository::new()),
            payments: Arc::new(InMemoryPaymentRepository::new()),
            jobs: InMemoryJobStore::arc(),
            pool: None,
        }
    }
}

fn message_bus(settings: &MessageBrokerSettings) -> anyhow::Result<Arc<dyn MessageBus<MessageEnvelope>>> {
    #[cfg(feature = "redis")]
    {
        if settings.is_configured() {
            let bus = kluster_infra::event_bus::RedisPubSubMessageBus::new(&settings.url, settings.channel.clone())
                .context("failed to open redis message bus")?;
            tracing::info!(channel = %bus.channel(), "using redis message bus");
            return Ok(Arc::new(bus));
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        if settings.is_configured() {
            tracing::warn!("redis support is not compiled in; ignoring MessageBrokerSettings:Url");
        }
    }

    tracing::info!("using in-memory message bus");
    Ok(Arc::new(InMemoryMessageBus::new()))
}

fn mail_service(settings: &AppSettings) -> Arc<dyn MailService> {
    let templates = TemplateStore::new(settings.mail.template_dir.clone());
    if settings.mail.is_configured() {
        Arc::new(HttpMailService::new(settings.mail.clone(), templates))
    } else {
        tracing::warn!("MailSettings are incomplete; mail will only be logged");
        Arc::new(LogMailService::new(templates))
    }
}

fn payment_gateway(settings: &AppSettings) -> Arc<dyn PaymentGateway> {
    if settings.paystack.is_configured() {
        Arc::new(PaystackClient::new(&settings.paystack))
    } else {
        tracing::warn!("PaystackSettings:SecretKey is empty; using the fake payment gateway");
        Arc::new(FakeGateway::new())
    }
}

fn consumers(invoices: &InvoiceService, queue: Arc<dyn JobQueue>) -> anyhow::Result<ConsumerRegistry> {
    let mut registry = ConsumerRegistry::new();
    registry
        .register::<PaymentCompleted, _>(InvoicePaidConsumer::new(invoices.clone()))?
        .register::<UserRegistered, _>(WelcomeMailConsumer::new(queue.clone()))?
        .register::<OtpRequested, _>(OtpMailConsumer::new(queue.clone()))?
        .register::<InvoiceCreated, _>(InvoiceMailConsumer::new(queue.clone()))?
        .register::<PaymentCompleted, _>(PaymentReceiptConsumer::new(queue))?;
    Ok(registry)
}

fn job_executor(store: Arc<dyn JobStore>, notifications: NotificationService, invoices: InvoiceService) -> JobExecutor {
    let mut executor = JobExecutor::new(store);
    executor
        .register_fn(JobKind::SEND_MAIL, move |job| {
            let notifications = notifications.clone();
            async move {
                match notifications.deliver_payload(&job.payload).await {
                    Ok(()) => JobResult::Success,
                    Err(err) => JobResult::Failure(err.to_string()),
                }
            }
        })
        .register_fn(JobKind::MARK_OVERDUE_INVOICES, move |_job| {
            let invoices = invoices.clone();
            async move {
                match invoices.mark_overdue(Utc::now()).await {
                    Ok(count) => {
                        if count > 0 {
                            tracing::info!(count, "invoices marked overdue");
                        }
                        JobResult::Success
                    }
                    Err(errors) => JobResult::Failure(errors.first().description().to_string()),
                }
            }
        });
    executor
}

/// Wire every module and start the background workers.
pub async fn build_services(
    settings: &AppSettings,
    overrides: Overrides,
) -> anyhow::Result<(Arc<AppServices>, Background)> {
    let tokens = TokenService::new(&settings.jwt).context("invalid JwtSettings")?;
    let storage = Storage::from_settings(settings).await?;
    let bus = message_bus(&settings.message_broker)?;
    let publisher = Publisher::new(bus.clone());

    let mail = overrides.mail.unwrap_or_else(|| mail_service(settings));
    let gateway = overrides.gateway.unwrap_or_else(|| payment_gateway(settings));

    let users = UserService::new(storage.users, tokens.clone(), publisher.clone());
    let clients = ClientService::new(storage.clients.clone());
    let products = ProductService::new(storage.products.clone());
    let invoices = InvoiceService::new(storage.invoices, storage.clients, storage.products, publisher.clone());
    let payments = PaymentService::new(storage.payments, gateway, invoices.clone(), publisher)
        .with_callback_url(settings.paystack.callback_url.clone());

    let scheduler = JobScheduler::new(storage.jobs.clone());
    let registry = consumers(&invoices, Arc::new(scheduler.clone()))?;
    let bus_host = BusHost::new(registry).start(bus.as_ref());

    let executor = job_executor(storage.jobs, NotificationService::new(mail), invoices.clone()).spawn(
        JobExecutorConfig::default()
            .with_poll_interval(Duration::from_millis(settings.jobs.poll_interval_ms.max(10)))
            .with_completed_retention(Duration::from_secs(settings.jobs.completed_retention_secs)),
    );
    let overdue_sweep = scheduler.every(
        JobKind::MARK_OVERDUE_INVOICES,
        Duration::from_secs(settings.jobs.overdue_sweep_secs.max(1)),
    );

    let services = AppServices {
        users,
        clients,
        products,
        invoices,
        payments,
        tokens: Arc::new(tokens),
        jobs: scheduler,
        database: storage.pool,
    };
    let background = Background {
        bus_host,
        executor,
        overdue_sweep,
    };
    Ok((Arc::new(services), background))
}

#[cfg(test)]
mod tests {
    use kluster_users::JwtSettings;

    use super::*;

    fn settings() -> AppSettings {
        AppSettings {
            jwt: JwtSettings {
                secret_key: "a-test-secret-that-is-long-enough".into(),
                issuer: "kluster".into(),
                audience: "kluster-clients".into(),
                expiry_minutes: 60,
            },
            ..AppSettings::default()
        }
    }

    #[tokio::test]
    async fn defaults_wire_in_memory_adapters() {
        let (services, background) = build_services(&settings(), Overrides::default()).await.unwrap();

        let (database, jobs) = services.health().await;
        assert_eq!(database, "in-memory");
        assert!(jobs.is_some());

        background.shutdown().await;
    }

    #[tokio::test]
    async fn missing_jwt_settings_are_fatal() {
        let result = build_services(&AppSettings::default(), Overrides::default()).await;
        assert!(result.is_err());
    }
}
