use std::sync::Arc;

use chrono::Utc;

use kluster_business::InvoiceService;
use kluster_business::invoice::TransitionError;
use kluster_business::errors as business_errors;
use kluster_core::{CurrentUser, InvoiceId, PaymentId, Role, ServiceError, ServiceResult, validate_request};
use kluster_messaging::{PaymentCompleted, Publisher};

use crate::dto::{InitializePaymentRequest, InitializePaymentResponse, PaymentResponse};
use crate::errors;
use crate::gateway::PaymentGateway;
use crate::payment::{Payment, PaymentStatus};
use crate::repository::{PaymentRepository, PaymentRepositoryError};

fn repository_error(err: PaymentRepositoryError) -> ServiceError {
    tracing::error!(error = %err, "payment repository failure");
    errors::UNEXPECTED
}

#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    invoices: InvoiceService,
    publisher: Publisher,
    callback_url: Option<String>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        invoices: InvoiceService,
        publisher: Publisher,
    ) -> Self {
        Self {
            payments,
            gateway,
            invoices,
            publisher,
            callback_url: None,
        }
    }

    pub fn with_callback_url(mut self, callback_url: Option<String>) -> Self {
        self.callback_url = callback_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Open a gateway transaction for the full amount of an unpaid invoice.
    pub async fn initialize(
        &self,
        principal: &CurrentUser,
        request: InitializePaymentRequest,
    ) -> ServiceResult<InitializePaymentResponse> {
        principal.require_role(Role::Business)?;
        validate_request(&request)?;

        let invoice_id: InvoiceId = request
            .invoice_id
            .trim()
            .parse()
            .map_err(|_| business_errors::invoice::NOT_FOUND)?;
        let invoice = self.invoices.find_for_owner(principal, &invoice_id).await?;
        invoice.ensure_editable().map_err(|err| match err {
            TransitionError::AlreadyPaid => business_errors::invoice::ALREADY_PAID,
            TransitionError::Cancelled => business_errors::invoice::CANCELLED,
        })?;
        if invoice.total.minor_units() <= 0 {
            return Err(errors::NOTHING_TO_PAY.into());
        }

        let reference = Payment::new_reference();
        let email = request.email.trim().to_string();
        let tx = self
            .gateway
            .initialize(&email, invoice.total, &reference, self.callback_url.as_deref())
            .await
            .map_err(|err| {
                tracing::error!(invoice_id = %invoice.id, error = %err, "gateway initialize failed");
                errors::GATEWAY_UNAVAILABLE
            })?;

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            invoice_id: invoice.id.clone(),
            business_id: principal.user_id.clone(),
            reference,
            amount: invoice.total,
            email,
            status: PaymentStatus::Initialized,
            authorization_url: tx.authorization_url.clone(),
            created_at: now,
            updated_at: now,
        };
        self.payments.save(&payment).await.map_err(repository_error)?;
        tracing::info!(payment_id = %payment.id, reference = %payment.reference, "payment initialized");

        Ok(InitializePaymentResponse {
            payment_id: payment.id.to_string(),
            reference: payment.reference,
            authorization_url: tx.authorization_url,
            access_code: tx.access_code,
            amount: payment.amount,
        })
    }

    /// Confirm a transaction with the gateway.
    ///
    /// Only a `success` status for exactly the recorded amount settles the
    /// payment; anything else marks it failed. Verifying a settled payment
    /// again returns it unchanged.
    pub async fn verify(&self, reference: &str) -> ServiceResult<PaymentResponse> {
        let mut payment = self
            .payments
            .find_by_reference(reference.trim())
            .await
            .map_err(repository_error)?
            .ok_or(errors::NOT_FOUND)?;

        if payment.status == PaymentStatus::Successful {
            return Ok(PaymentResponse::from(&payment));
        }

        let verified = self.gateway.verify(&payment.reference).await.map_err(|err| {
            tracing::error!(reference = %payment.reference, error = %err, "gateway verify failed");
            errors::GATEWAY_UNAVAILABLE
        })?;

        payment.updated_at = Utc::now();
        if !verified.is_success() || verified.amount != payment.amount {
            tracing::warn!(
                reference = %payment.reference,
                gateway_status = %verified.status,
                expected = %payment.amount,
                received = %verified.amount,
                "transaction could not be validated"
            );
            payment.status = PaymentStatus::Failed;
            self.payments.save(&payment).await.map_err(repository_error)?;
            return Err(errors::NOT_VALID.into());
        }

        payment.status = PaymentStatus::Successful;
        self.payments.save(&payment).await.map_err(repository_error)?;
        tracing::info!(payment_id = %payment.id, invoice_id = %payment.invoice_id, "payment successful");

        let message = PaymentCompleted {
            payment_id: payment.id.clone(),
            invoice_id: payment.invoice_id.clone(),
            business_id: payment.business_id.clone(),
            reference: payment.reference.clone(),
            amount: payment.amount,
            email: payment.email.clone(),
        };
        if let Err(err) = self.publisher.publish(&message) {
            tracing::error!(payment_id = %payment.id, error = %err, "failed to publish PaymentCompleted");
        }

        Ok(PaymentResponse::from(&payment))
    }

    pub async fn get(&self, principal: &CurrentUser, id: &str) -> ServiceResult<PaymentResponse> {
        principal.require_role(Role::Business)?;
        let id: PaymentId = id.parse().map_err(|_| errors::NOT_FOUND)?;
        let payment = self
            .payments
            .get(&principal.user_id, &id)
            .await
            .map_err(repository_error)?
            .ok_or(errors::NOT_FOUND)?;
        Ok(PaymentResponse::from(&payment))
    }

    pub async fn list_for_invoice(&self, principal: &CurrentUser, invoice_id: &str) -> ServiceResult<Vec<PaymentResponse>> {
        principal.require_role(Role::Business)?;
        let invoice_id: InvoiceId = invoice_id
            .parse()
            .map_err(|_| business_errors::invoice::NOT_FOUND)?;
        let invoice = self.invoices.find_for_owner(principal, &invoice_id).await?;
        let payments = self
            .payments
            .list_for_invoice(&principal.user_id, &invoice.id)
            .await
            .map_err(repository_error)?;
        Ok(payments.iter().map(PaymentResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use kluster_business::dto::{ClientRequest, InvoiceItemRequest, InvoiceRequest};
    use kluster_business::{
        ClientService, InMemoryClientRepository, InMemoryInvoiceRepository, InMemoryProductRepository,
        InvoicePaidConsumer,
    };
    use kluster_core::{Money, UserId};
    use kluster_messaging::{BusHost, ConsumerRegistry, InMemoryMessageBus, MessageBus, MessageEnvelope, Subscription};

    use super::*;
    use crate::gateway::FakeGateway;
    use crate::repository::InMemoryPaymentRepository;

    struct Harness {
        me: CurrentUser,
        invoice_id: String,
        invoices: InvoiceService,
        payments: PaymentService,
        gateway: Arc<FakeGateway>,
        inbox: Subscription<MessageEnvelope>,
    }

    async fn harness(unit_price: i64) -> Harness {
        let bus: Arc<InMemoryMessageBus<MessageEnvelope>> = Arc::new(InMemoryMessageBus::new());
        let inbox = bus.subscribe();
        let publisher = Publisher::new(bus);
        let client_repo = Arc::new(InMemoryClientRepository::new());
        let clients = ClientService::new(client_repo.clone());
        let invoices = InvoiceService::new(
            Arc::new(InMemoryInvoiceRepository::new()),
            client_repo,
            Arc::new(InMemoryProductRepository::new()),
            publisher.clone(),
        );
        let gateway = Arc::new(FakeGateway::new());
        let payments = PaymentService::new(
            Arc::new(InMemoryPaymentRepository::new()),
            gateway.clone(),
            invoices.clone(),
            publisher,
        );

        let me = CurrentUser::new(UserId::new(), "shop@example.com", Role::Business);
        let client = clients
            .create(
                &me,
                ClientRequest {
                    first_name: "Flora".into(),
                    last_name: "Nwapa".into(),
                    email_address: "flora@example.com".into(),
                    address: "9 Awolowo Road, Ikoyi".into(),
                    phone_number: None,
                },
            )
            .await
            .unwrap();
        let invoice = invoices
            .create(
                &me,
                InvoiceRequest {
                    client_id: client.id,
                    due_date: Some(Utc::now() + Duration::days(10)),
                    items: vec![InvoiceItemRequest {
                        description: "Photography".into(),
                        quantity: 2,
                        unit_price: Money::from_minor(unit_price),
                        product_id: None,
                    }],
                },
            )
            .await
            .unwrap();

        Harness {
            me,
            invoice_id: invoice.id,
            invoices,
            payments,
            gateway,
            inbox,
        }
    }

    fn drain(inbox: &mut Subscription<MessageEnvelope>) -> Vec<MessageEnvelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = inbox.try_recv() {
            out.push(envelope);
        }
        out
    }

    fn init_request(invoice_id: &str) -> InitializePaymentRequest {
        InitializePaymentRequest {
            invoice_id: invoice_id.into(),
            email: "flora@example.com".into(),
        }
    }

    #[tokio::test]
    async fn initialize_records_the_invoice_total() {
        let h = harness(15_000).await;
        let started = h.payments.initialize(&h.me, init_request(&h.invoice_id)).await.unwrap();
        assert_eq!(started.amount, Money::from_minor(30_000));
        assert!(started.payment_id.starts_with("PAY-"));
        assert!(started.authorization_url.contains(&started.reference));

        let fetched = h.payments.get(&h.me, &started.payment_id).await.unwrap();
        assert_eq!(fetched.status, "Initialized");
        assert_eq!(
            h.payments.list_for_invoice(&h.me, &h.invoice_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn successful_verification_publishes_and_settles_the_invoice() {
        let mut h = harness(15_000).await;
        let started = h.payments.initialize(&h.me, init_request(&h.invoice_id)).await.unwrap();
        drain(&mut h.inbox);

        let verified = h.payments.verify(&started.reference).await.unwrap();
        assert_eq!(verified.status, "Successful");

        let published = drain(&mut h.inbox);
        assert_eq!(published.len(), 1);

        let mut registry = ConsumerRegistry::new();
        registry
            .register::<PaymentCompleted, _>(InvoicePaidConsumer::new(h.invoices.clone()))
            .unwrap();
        BusHost::new(registry).dispatch(&published[0]).await;
        assert_eq!(h.invoices.get(&h.me, &h.invoice_id).await.unwrap().status, "Paid");

        // Verifying again is a no-op.
        let again = h.payments.verify(&started.reference).await.unwrap();
        assert_eq!(again.status, "Successful");
        assert!(drain(&mut h.inbox).is_empty());
    }

    #[tokio::test]
    async fn amount_mismatch_is_not_valid() {
        let mut h = harness(15_000).await;
        let started = h.payments.initialize(&h.me, init_request(&h.invoice_id)).await.unwrap();
        h.gateway
            .set_outcome(&started.reference, "success", Money::from_minor(100));
        drain(&mut h.inbox);

        let err = h.payments.verify(&started.reference).await.unwrap_err();
        assert_eq!(err.first().code(), "Invoice.NotValid");
        assert_eq!(err.first().description(), "Could not validate transaction.");
        assert_eq!(err.status_code(), 400);
        assert!(drain(&mut h.inbox).is_empty());

        let payment = h.payments.get(&h.me, &started.payment_id).await.unwrap();
        assert_eq!(payment.status, "Failed");
    }

    #[tokio::test]
    async fn failed_gateway_status_is_not_valid() {
        let h = harness(15_000).await;
        let started = h.payments.initialize(&h.me, init_request(&h.invoice_id)).await.unwrap();
        h.gateway
            .set_outcome(&started.reference, "abandoned", Money::from_minor(30_000));

        let err = h.payments.verify(&started.reference).await.unwrap_err();
        assert_eq!(err.first().code(), "Invoice.NotValid");
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let h = harness(15_000).await;
        let err = h.payments.verify("nope").await.unwrap_err();
        assert_eq!(err.first().code(), "Payment.NotFound");
    }

    #[tokio::test]
    async fn paid_or_foreign_invoices_cannot_be_initialized() {
        let h = harness(15_000).await;
        let stranger = CurrentUser::new(UserId::new(), "x@example.com", Role::Business);
        let err = h
            .payments
            .initialize(&stranger, init_request(&h.invoice_id))
            .await
            .unwrap_err();
        assert_eq!(err.first().code(), "Invoice.NotFound");

        h.invoices
            .mark_paid(&h.invoice_id.parse().unwrap())
            .await
            .unwrap();
        let err = h
            .payments
            .initialize(&h.me, init_request(&h.invoice_id))
            .await
            .unwrap_err();
        assert_eq!(err.first().code(), "Invoice.AlreadyPaid");
    }

    #[tokio::test]
    async fn zero_total_has_nothing_to_pay() {
        let h = harness(0).await;
        let err = h
            .payments
            .initialize(&h.me, init_request(&h.invoice_id))
            .await
            .unwrap_err();
        assert_eq!(err.first().code(), "Payment.NothingToPay");
    }
}
