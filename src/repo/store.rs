use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::{Order, PaymentState, ReferenceKey};
use crate::error::PaymentResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One adapter dispatch against a gateway. Every dispatch is recorded
/// exactly once, whatever its outcome.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub store_id: String,
    pub gateway_name: GatewayName,
    pub order_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The provider accepted the order; the order moves to
    /// `AwaitingConfirmation` and remembers the provider reference.
    Succeeded {
        payment_reference: String,
        is_test_mode: bool,
    },
    Failed,
}

/// Compare-and-set on `payment_status`: applied only while the order is in
/// one of `from`.
#[derive(Debug, Clone)]
pub struct OrderTransition {
    pub store_id: String,
    pub order_id: i64,
    pub from: Vec<PaymentState>,
    pub to: PaymentState,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl OrderTransition {
    pub fn new(store_id: &str, order_id: i64, to: PaymentState, at: DateTime<Utc>) -> Self {
        Self {
            store_id: store_id.to_string(),
            order_id,
            from: to.allowed_sources().to_vec(),
            to,
            transaction_id: None,
            failure_reason: None,
            at,
        }
    }
}

/// Compare-and-set on the cumulative `refund_amount`: applied only if no
/// other refund landed since `expected_refunded` was read.
#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub store_id: String,
    pub order_id: i64,
    pub expected_refunded: Decimal,
    pub amount: Decimal,
    pub new_status: PaymentState,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Order and gateway persistence consumed by the orchestrator. Gateway
/// statistics are only ever changed through [`PaymentStore::record_attempt`].
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get_order(&self, store_id: &str, order_id: i64) -> PaymentResult<Option<Order>>;

    async fn find_order_by_reference(&self, key: &ReferenceKey) -> PaymentResult<Option<Order>>;

    async fn get_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<Option<GatewayConfig>>;

    /// All gateways of a store in insertion order.
    async fn list_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>>;

    /// Active gateways, priority descending, insertion order among equals.
    async fn list_active_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>>;

    /// Assigns the id. Fails `Conflict` when the store already has the gateway.
    async fn insert_gateway(&self, config: GatewayConfig) -> PaymentResult<GatewayConfig>;

    /// Persists admin-editable fields. Statistics are left untouched.
    async fn save_gateway(&self, config: &GatewayConfig) -> PaymentResult<()>;

    async fn delete_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<bool>;

    /// Updates gateway statistics and, on success, the order in one atomic
    /// step. Returns whether the order moved.
    async fn record_attempt(&self, attempt: &AttemptRecord) -> PaymentResult<bool>;

    async fn transition_order(&self, transition: &OrderTransition) -> PaymentResult<bool>;

    async fn record_refund(&self, refund: &RefundRecord) -> PaymentResult<bool>;
}
