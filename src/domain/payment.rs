use crate::domain::gateway::{GatewayName, GatewayType};
use crate::domain::order::PaymentState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a shopper's client needs to continue checkout with the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_id: String,
    pub checkout: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Created,
    Authorized,
    Captured,
    Failed,
    Pending,
}

/// Normalized answer to "what does the provider think happened".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPaymentStatus {
    pub payment_id: String,
    pub order_reference: Option<String>,
    pub status: ProviderStatus,
    pub amount: Decimal,
    pub currency: String,
    pub captured: bool,
    pub transaction_id: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: String,
    pub amount: Decimal,
}

/// An inbound provider notification: the raw body plus lower-cased headers,
/// kept verbatim so adapters can verify signatures over the exact bytes.
#[derive(Debug, Clone, Default)]
pub struct WebhookEvent {
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl WebhookEvent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Result of mapping a provider event onto the internal status vocabulary.
/// `new_status == None` means acknowledged without a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub event_type: String,
    pub order_reference: Option<String>,
    pub new_status: Option<PaymentState>,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl StateTransition {
    pub fn no_op(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            order_reference: None,
            new_status: None,
            transaction_id: None,
            failure_reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodView {
    pub gateway_name: GatewayName,
    pub display_name: String,
    pub gateway_type: GatewayType,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub transaction_fees: Decimal,
    pub supports_refunds: bool,
    pub estimated_time: i32,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentResponse {
    pub order_id: i64,
    pub gateway_name: GatewayName,
    pub payment_status: PaymentState,
    pub intent: PaymentIntent,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentResponse {
    pub provider: ProviderPaymentStatus,
    pub order_id: Option<i64>,
    pub payment_status: Option<PaymentState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundResponse {
    pub order_id: i64,
    pub refund: RefundResult,
    pub payment_status: PaymentState,
    pub refund_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookDisposition {
    Applied,
    AlreadyApplied,
    Stale,
    Ignored,
    OrderNotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub disposition: WebhookDisposition,
    pub event_type: String,
    pub order_id: Option<i64>,
    pub payment_status: Option<PaymentState>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}
