use crate::domain::gateway::GatewayName;
use crate::domain::order::ReferenceKey;
use crate::domain::payment::{WebhookDisposition, WebhookEvent, WebhookOutcome};
use crate::error::PaymentResult;
use crate::service::orchestrator::{PaymentOrchestrator, ProviderTransition};

/// Routes inbound provider notifications to the right adapter and applies
/// the resulting transition. Redelivery of an event already applied, an
/// unknown event type, or an order this store does not know all end in an
/// acknowledged outcome, never an error.
#[derive(Clone)]
pub struct WebhookRouter {
    pub orchestrator: PaymentOrchestrator,
}

impl WebhookRouter {
    pub fn new(orchestrator: PaymentOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn handle_webhook(
        &self,
        store_id: &str,
        gateway_name: &GatewayName,
        event: &WebhookEvent,
    ) -> PaymentResult<WebhookOutcome> {
        let gateway = self.orchestrator.load_gateway(store_id, gateway_name).await?;
        let adapter = self.orchestrator.adapters.resolve(gateway_name)?;
        let transition = adapter.handle_webhook(&gateway, event)?;

        let outcome = |disposition, order_id, payment_status| WebhookOutcome {
            disposition,
            event_type: transition.event_type.clone(),
            order_id,
            payment_status,
        };

        let (Some(new_status), Some(reference)) = (transition.new_status, transition.order_reference.clone())
        else {
            tracing::debug!(
                "{} webhook {} acknowledged without action",
                gateway_name,
                transition.event_type
            );
            return Ok(outcome(WebhookDisposition::Ignored, None, None));
        };

        let key = ReferenceKey {
            store_id: store_id.to_string(),
            gateway_name: gateway_name.clone(),
            is_test_mode: gateway.is_test_mode,
            reference,
        };
        let Some(order) = self.orchestrator.store.find_order_by_reference(&key).await? else {
            tracing::warn!(
                "{} webhook {} references unknown order {} in store {}",
                gateway_name,
                transition.event_type,
                key.reference,
                store_id
            );
            return Ok(outcome(WebhookDisposition::OrderNotFound, None, None));
        };

        let (disposition, status) = self
            .orchestrator
            .apply_provider_transition(
                &order,
                &ProviderTransition {
                    to: new_status,
                    transaction_id: transition.transaction_id.clone(),
                    failure_reason: transition.failure_reason.clone(),
                },
            )
            .await?;

        tracing::info!(
            "{} webhook {} on order {}: {:?}",
            gateway_name,
            transition.event_type,
            order.id,
            disposition
        );
        Ok(outcome(disposition, Some(order.id), Some(status)))
    }
}
