use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::Order;
use crate::domain::payment::{
    PaymentIntent, ProviderPaymentStatus, RefundResult, StateTransition, WebhookEvent,
};
use crate::error::{PaymentError, PaymentResult};
use crate::gateways::GatewayAdapter;
use rust_decimal::Decimal;
use serde_json::json;

/// Cash on delivery. Nothing leaves the process: the intent just tells the
/// storefront to collect on delivery, and settlement happens out of band.
pub struct CashOnDelivery;

#[async_trait::async_trait]
impl GatewayAdapter for CashOnDelivery {
    fn name(&self) -> GatewayName {
        GatewayName::Cod
    }

    async fn create_order(&self, config: &GatewayConfig, order: &Order) -> PaymentResult<PaymentIntent> {
        Ok(PaymentIntent {
            payment_id: format!("cod_{}", order.order_number),
            checkout: json!({
                "mode": "offline",
                "instructions": config
                    .display_description
                    .clone()
                    .unwrap_or_else(|| "Pay in cash when your order is delivered".to_string()),
                "amount_due": order.total_amount,
                "currency": order.currency,
            }),
        })
    }

    async fn verify_payment(
        &self,
        _config: &GatewayConfig,
        _payment_id: &str,
        _payload: Option<&serde_json::Value>,
    ) -> PaymentResult<ProviderPaymentStatus> {
        Err(PaymentError::Unsupported(
            "cash on delivery payments are confirmed offline".to_string(),
        ))
    }

    async fn process_refund(
        &self,
        _config: &GatewayConfig,
        _order: &Order,
        _refund_amount: Decimal,
        _reason: Option<&str>,
    ) -> PaymentResult<RefundResult> {
        Err(PaymentError::Unsupported(
            "cash on delivery refunds are settled offline".to_string(),
        ))
    }

    fn handle_webhook(&self, _config: &GatewayConfig, _event: &WebhookEvent) -> PaymentResult<StateTransition> {
        Ok(StateTransition::no_op("cod.ignored"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::GatewayType;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn intent_is_offline_and_refunds_are_unsupported() {
        let cfg = GatewayConfig::new("s1", GatewayName::Cod, GatewayType::Offline, "Cash on Delivery", chrono::Utc::now());
        let order = Order::new("s1", 1, "ORD-1", dec!(250.00), "INR");

        let intent = CashOnDelivery.create_order(&cfg, &order).await.unwrap();
        assert_eq!(intent.payment_id, "cod_ORD-1");
        assert_eq!(intent.checkout["mode"], "offline");

        let err = CashOnDelivery
            .process_refund(&cfg, &order, dec!(10.00), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
