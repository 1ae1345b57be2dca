use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::{Order, PaymentState};
use crate::domain::payment::{
    PaymentIntent, ProviderPaymentStatus, ProviderStatus, RefundResult, StateTransition,
    WebhookEvent,
};
use crate::error::{PaymentError, PaymentResult};
use crate::gateways::{ensure_refundable, GatewayAdapter};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted adapter for local runs and tests. Registers under any gateway
/// name. `behavior` is one of `ALWAYS_SUCCESS` (default), `ALWAYS_FAILURE`
/// or `ALWAYS_TIMEOUT`.
///
/// Webhook bodies are `{"event": "paid"|"failed"|..., "reference": "...",
/// "transaction_id": "..."}`.
pub struct MockGateway {
    pub gateway_name: GatewayName,
    pub behavior: String,
    pub captured_amount: Decimal,
    pub captured_currency: String,
    calls: AtomicUsize,
}

impl MockGateway {
    pub fn new(gateway_name: GatewayName, behavior: &str) -> Self {
        Self {
            gateway_name,
            behavior: behavior.to_string(),
            captured_amount: Decimal::ZERO,
            captured_currency: "INR".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Amount and currency `verify_payment` reports as captured.
    pub fn with_capture(mut self, amount: Decimal, currency: &str) -> Self {
        self.captured_amount = amount;
        self.captured_currency = currency.to_string();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn scripted(&self) -> PaymentResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior.as_str() {
            "ALWAYS_FAILURE" => Err(PaymentError::provider(&self.gateway_name, "MOCK_DECLINED: mock decline")),
            "ALWAYS_TIMEOUT" => Err(PaymentError::transient(&self.gateway_name, "mock timeout")),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for MockGateway {
    fn name(&self) -> GatewayName {
        self.gateway_name.clone()
    }

    async fn create_order(&self, _config: &GatewayConfig, order: &Order) -> PaymentResult<PaymentIntent> {
        self.scripted()?;
        let payment_id = format!("mock_{}", order.order_number);
        Ok(PaymentIntent {
            payment_id: payment_id.clone(),
            checkout: json!({ "mock_order_id": payment_id, "amount": order.total_amount }),
        })
    }

    async fn verify_payment(
        &self,
        _config: &GatewayConfig,
        payment_id: &str,
        _payload: Option<&serde_json::Value>,
    ) -> PaymentResult<ProviderPaymentStatus> {
        self.scripted()?;
        Ok(ProviderPaymentStatus {
            payment_id: payment_id.to_string(),
            order_reference: Some(payment_id.to_string()),
            status: ProviderStatus::Captured,
            amount: self.captured_amount,
            currency: self.captured_currency.clone(),
            captured: true,
            transaction_id: Some(format!("mock_txn_{}", payment_id)),
            method: Some("mock".to_string()),
        })
    }

    async fn process_refund(
        &self,
        _config: &GatewayConfig,
        order: &Order,
        refund_amount: Decimal,
        _reason: Option<&str>,
    ) -> PaymentResult<RefundResult> {
        ensure_refundable(order, refund_amount)?;
        self.scripted()?;
        Ok(RefundResult {
            refund_id: format!("mock_rfnd_{}", uuid::Uuid::new_v4()),
            status: "processed".to_string(),
            amount: refund_amount,
        })
    }

    fn handle_webhook(&self, _config: &GatewayConfig, event: &WebhookEvent) -> PaymentResult<StateTransition> {
        let v: serde_json::Value = serde_json::from_str(&event.body)
            .map_err(|e| PaymentError::provider(&self.gateway_name, e.to_string()))?;
        let event_type = v.get("event").and_then(|e| e.as_str()).unwrap_or_default().to_string();
        let new_status = match event_type.as_str() {
            "paid" => PaymentState::Paid,
            "failed" => PaymentState::Failed,
            _ => return Ok(StateTransition::no_op(event_type)),
        };
        Ok(StateTransition {
            order_reference: v.get("reference").and_then(|r| r.as_str()).map(ToString::to_string),
            new_status: Some(new_status),
            transaction_id: v
                .get("transaction_id")
                .and_then(|t| t.as_str())
                .map(ToString::to_string),
            failure_reason: (new_status == PaymentState::Failed).then(|| "mock failure".to_string()),
            event_type,
        })
    }
}
