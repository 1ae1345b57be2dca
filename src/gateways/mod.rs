use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::Order;
use crate::domain::payment::{
    PaymentIntent, ProviderPaymentStatus, RefundResult, StateTransition, WebhookEvent,
};
use crate::error::{PaymentError, PaymentResult};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub mod cod;
pub mod mock;
pub mod paypal;
pub mod phonepe;
pub mod razorpay;
pub mod signing;

/// Per-provider translation layer. Implementations own every wire detail
/// (URLs, auth, body shapes, amount units) and translate every failure into
/// [`PaymentError`] before returning.
#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> GatewayName;

    async fn create_order(&self, config: &GatewayConfig, order: &Order) -> PaymentResult<PaymentIntent>;

    async fn verify_payment(
        &self,
        config: &GatewayConfig,
        payment_id: &str,
        payload: Option<&serde_json::Value>,
    ) -> PaymentResult<ProviderPaymentStatus>;

    async fn process_refund(
        &self,
        config: &GatewayConfig,
        order: &Order,
        refund_amount: Decimal,
        reason: Option<&str>,
    ) -> PaymentResult<RefundResult>;

    fn handle_webhook(&self, config: &GatewayConfig, event: &WebhookEvent) -> PaymentResult<StateTransition>;
}

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<GatewayName, Arc<dyn GatewayAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, adapter: Arc<dyn GatewayAdapter>) -> Self {
        self.adapters.insert(adapter.name(), adapter);
        self
    }

    pub fn resolve(&self, name: &GatewayName) -> PaymentResult<Arc<dyn GatewayAdapter>> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| PaymentError::UnsupportedGateway(name.to_string()))
    }

    /// The stock provider set, all sharing one HTTP client.
    pub fn with_defaults(endpoints: &ProviderEndpoints, client: reqwest::Client) -> Self {
        Self::new()
            .register(Arc::new(razorpay::RazorpayGateway {
                base_url: endpoints.razorpay_base_url.clone(),
                call_cap: endpoints.call_cap,
                client: client.clone(),
            }))
            .register(Arc::new(paypal::PaypalGateway {
                live_url: endpoints.paypal_live_url.clone(),
                sandbox_url: endpoints.paypal_sandbox_url.clone(),
                public_base_url: endpoints.public_base_url.clone(),
                call_cap: endpoints.call_cap,
                client: client.clone(),
            }))
            .register(Arc::new(phonepe::PhonepeGateway {
                live_url: endpoints.phonepe_live_url.clone(),
                sandbox_url: endpoints.phonepe_sandbox_url.clone(),
                public_base_url: endpoints.public_base_url.clone(),
                call_cap: endpoints.call_cap,
                client,
            }))
            .register(Arc::new(cod::CashOnDelivery))
    }
}

#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub razorpay_base_url: String,
    pub paypal_live_url: String,
    pub paypal_sandbox_url: String,
    pub phonepe_live_url: String,
    pub phonepe_sandbox_url: String,
    pub public_base_url: String,
    pub call_cap: Duration,
}

/// Bound for a single provider call: the gateway's payment timeout, capped.
pub fn call_timeout(config: &GatewayConfig, cap: Duration) -> Duration {
    let configured = Duration::from_secs(config.payment_timeout.max(1) as u64);
    configured.min(cap)
}

pub(crate) fn map_transport_error(gateway: &GatewayName, e: reqwest::Error) -> PaymentError {
    if e.is_timeout() || e.is_connect() {
        PaymentError::transient(gateway, e.to_string())
    } else if e.is_decode() {
        PaymentError::provider(gateway, format!("malformed response: {}", e))
    } else {
        PaymentError::transient(gateway, e.to_string())
    }
}

/// Reads a JSON body from a response, turning non-2xx statuses into
/// provider errors with a bounded excerpt of the body.
pub(crate) async fn read_json(
    gateway: &GatewayName,
    resp: reqwest::Response,
) -> PaymentResult<serde_json::Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(200).collect();
        if status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::GATEWAY_TIMEOUT
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(PaymentError::transient(gateway, format!("HTTP_{}: {}", status.as_u16(), excerpt)));
        }
        return Err(PaymentError::provider(gateway, format!("HTTP_{}: {}", status.as_u16(), excerpt)));
    }
    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| map_transport_error(gateway, e))
}

pub(crate) fn required_str<'a>(
    gateway: &GatewayName,
    v: &'a serde_json::Value,
    pointer: &str,
) -> PaymentResult<&'a str> {
    v.pointer(pointer)
        .and_then(|x| x.as_str())
        .ok_or_else(|| PaymentError::provider(gateway, format!("response missing {}", pointer)))
}

pub(crate) fn credential<'a>(
    gateway: &GatewayName,
    value: &'a Option<String>,
    field: &str,
) -> PaymentResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::Unsupported(format!("{} is missing credential {}", gateway, field)))
}

/// Shared pre-flight check every adapter runs before a refund call.
pub(crate) fn ensure_refundable(order: &Order, refund_amount: Decimal) -> PaymentResult<()> {
    if refund_amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidRefundAmount(format!(
            "refund amount must be positive, got {}",
            refund_amount
        )));
    }
    if refund_amount > order.total_amount {
        return Err(PaymentError::InvalidRefundAmount(format!(
            "refund amount {} exceeds order total {}",
            refund_amount, order.total_amount
        )));
    }
    Ok(())
}

/// Stable per-refund key: the order number plus the cumulative refunded
/// total after this refund, so a retried refund call reuses the same key.
pub fn refund_idempotency_key(order: &Order, refund_amount: Decimal) -> String {
    format!(
        "{}-R{}",
        order.order_number,
        (order.refund_amount + refund_amount).normalize()
    )
}
