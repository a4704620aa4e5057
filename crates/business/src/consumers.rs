//! Message consumers owned by the business module.

use async_trait::async_trait;

use kluster_messaging::{ConsumeContext, ConsumeError, Consumer, PaymentCompleted};

use crate::invoices::InvoiceService;

/// Marks the paid invoice when a payment completes.
pub struct InvoicePaidConsumer {
    invoices: InvoiceService,
}

impl InvoicePaidConsumer {
    pub fn new(invoices: InvoiceService) -> Self {
        Self { invoices }
    }
}

#[async_trait]
impl Consumer<PaymentCompleted> for InvoicePaidConsumer {
    async fn consume(&self, message: PaymentCompleted, context: &ConsumeContext) -> Result<(), ConsumeError> {
        match self.invoices.mark_paid(&message.invoice_id).await {
            Ok(changed) => {
                tracing::debug!(
                    invoice_id = %message.invoice_id,
                    reference = %message.reference,
                    message_id = %context.message_id,
                    changed,
                    "payment applied to invoice"
                );
                Ok(())
            }
            Err(errors) => Err(ConsumeError::handler(errors.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use kluster_core::{CurrentUser, InvoiceId, Money, PaymentId, Role, UserId};
    use kluster_messaging::{BusHost, ConsumerRegistry, InMemoryMessageBus, MessageEnvelope, Publisher};

    use super::*;
    use crate::dto::{ClientRequest, InvoiceItemRequest, InvoiceRequest};
    use crate::repository::{InMemoryClientRepository, InMemoryInvoiceRepository, InMemoryProductRepository};
    use crate::ClientService;

    #[tokio::test]
    async fn payment_completed_marks_invoice_paid() {
        let bus: Arc<InMemoryMessageBus<MessageEnvelope>> = Arc::new(InMemoryMessageBus::new());
        let client_repo = Arc::new(InMemoryClientRepository::new());
        let clients = ClientService::new(client_repo.clone());
        let invoices = InvoiceService::new(
            Arc::new(InMemoryInvoiceRepository::new()),
            client_repo,
            Arc::new(InMemoryProductRepository::new()),
            Publisher::new(bus),
        );

        let me = CurrentUser::new(UserId::new(), "shop@example.com", Role::Business);
        let client = clients
            .create(
                &me,
                ClientRequest {
                    first_name: "Buchi".into(),
                    last_name: "Emecheta".into(),
                    email_address: "buchi@example.com".into(),
                    address: "3 Allen Avenue, Ikeja".into(),
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
                    due_date: Some(Utc::now() + Duration::days(7)),
                    items: vec![InvoiceItemRequest {
                        description: "Editing".into(),
                        quantity: 1,
                        unit_price: Money::from_minor(80_000),
                        product_id: None,
                    }],
                },
            )
            .await
            .unwrap();

        let mut registry = ConsumerRegistry::new();
        registry
            .register::<PaymentCompleted, _>(InvoicePaidConsumer::new(invoices.clone()))
            .unwrap();
        let host = BusHost::new(registry);

        let invoice_id: InvoiceId = invoice.id.parse().unwrap();
        let message = PaymentCompleted {
            payment_id: PaymentId::new(),
            invoice_id,
            business_id: me.user_id.clone(),
            reference: "ref-123".into(),
            amount: Money::from_minor(80_000),
            email: "buchi@example.com".into(),
        };
        let envelope = MessageEnvelope::wrap(&message, None).unwrap();

        assert_eq!(host.dispatch(&envelope).await, 1);
        // Redelivery is harmless.
        assert_eq!(host.dispatch(&envelope).await, 1);
        assert_eq!(invoices.get(&me, &invoice.id).await.unwrap().status, "Paid");
    }
}
