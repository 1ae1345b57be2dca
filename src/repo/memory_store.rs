use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::{Order, PaymentState, ReferenceKey};
use crate::error::{PaymentError, PaymentResult};
use crate::repo::store::{AttemptOutcome, AttemptRecord, OrderTransition, PaymentStore, RefundRecord};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    orders: BTreeMap<(String, i64), Order>,
    gateways: Vec<GatewayConfig>,
    next_gateway_id: i64,
}

impl MemoryState {
    fn gateway_mut(&mut self, store_id: &str, name: &GatewayName) -> Option<&mut GatewayConfig> {
        self.gateways
            .iter_mut()
            .find(|g| g.store_id == store_id && &g.gateway_name == name)
    }
}

/// In-process store for tests and database-less local runs. A single lock
/// covers orders and gateways, which makes every operation atomic.
#[derive(Default)]
pub struct MemoryPaymentStore {
    state: Mutex<MemoryState>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders belong to the storefront; this stands in for checkout
    /// creating one.
    pub async fn put_order(&self, order: Order) {
        let mut state = self.state.lock().await;
        state.orders.insert((order.store_id.clone(), order.id), order);
    }
}

#[async_trait::async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn get_order(&self, store_id: &str, order_id: i64) -> PaymentResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&(store_id.to_string(), order_id)).cloned())
    }

    async fn find_order_by_reference(&self, key: &ReferenceKey) -> PaymentResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|o| {
                o.store_id == key.store_id
                    && o.payment_gateway.as_ref() == Some(&key.gateway_name)
                    && o.payment_test_mode.unwrap_or(false) == key.is_test_mode
                    && o.payment_reference.as_deref() == Some(key.reference.as_str())
            })
            .cloned())
    }

    async fn get_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<Option<GatewayConfig>> {
        let state = self.state.lock().await;
        Ok(state
            .gateways
            .iter()
            .find(|g| g.store_id == store_id && &g.gateway_name == gateway_name)
            .cloned())
    }

    async fn list_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        let state = self.state.lock().await;
        Ok(state
            .gateways
            .iter()
            .filter(|g| g.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn list_active_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        let mut active: Vec<GatewayConfig> = self
            .list_gateways(store_id)
            .await?
            .into_iter()
            .filter(|g| g.is_active)
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(active)
    }

    async fn insert_gateway(&self, mut config: GatewayConfig) -> PaymentResult<GatewayConfig> {
        let mut state = self.state.lock().await;
        if state.gateway_mut(&config.store_id, &config.gateway_name).is_some() {
            return Err(PaymentError::Conflict(format!(
                "store {} already has gateway {}",
                config.store_id, config.gateway_name
            )));
        }
        state.next_gateway_id += 1;
        config.id = state.next_gateway_id;
        state.gateways.push(config.clone());
        Ok(config)
    }

    async fn save_gateway(&self, config: &GatewayConfig) -> PaymentResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .gateway_mut(&config.store_id, &config.gateway_name)
            .ok_or_else(|| PaymentError::GatewayNotFound {
                gateway: config.gateway_name.to_string(),
            })?;
        let stats = existing.stats.clone();
        *existing = GatewayConfig {
            id: existing.id,
            created_at: existing.created_at,
            stats,
            ..config.clone()
        };
        Ok(())
    }

    async fn delete_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.gateways.len();
        state
            .gateways
            .retain(|g| !(g.store_id == store_id && &g.gateway_name == gateway_name));
        Ok(state.gateways.len() != before)
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> PaymentResult<bool> {
        let mut state = self.state.lock().await;
        let gateway = state
            .gateway_mut(&attempt.store_id, &attempt.gateway_name)
            .ok_or_else(|| PaymentError::GatewayNotFound {
                gateway: attempt.gateway_name.to_string(),
            })?;
        gateway.stats.total_transactions += 1;
        gateway.stats.last_transaction_at = Some(attempt.at);
        gateway.updated_at = attempt.at;

        let AttemptOutcome::Succeeded { payment_reference, is_test_mode } = &attempt.outcome else {
            gateway.stats.failed_transactions += 1;
            return Ok(false);
        };
        gateway.stats.total_amount_processed += attempt.amount;
        *gateway
            .stats
            .processed_by_currency
            .entry(attempt.currency.to_uppercase())
            .or_default() += attempt.amount;

        let Some(order) = state.orders.get_mut(&(attempt.store_id.clone(), attempt.order_id)) else {
            return Ok(false);
        };
        if !order.payment_status.is_payable() {
            return Ok(false);
        }
        order.payment_status = PaymentState::AwaitingConfirmation;
        order.payment_gateway = Some(attempt.gateway_name.clone());
        order.payment_reference = Some(payment_reference.clone());
        order.payment_test_mode = Some(*is_test_mode);
        order.payment_failure_reason = None;
        Ok(true)
    }

    async fn transition_order(&self, transition: &OrderTransition) -> PaymentResult<bool> {
        let mut state = self.state.lock().await;
        let Some(order) = state
            .orders
            .get_mut(&(transition.store_id.clone(), transition.order_id))
        else {
            return Ok(false);
        };
        if !transition.from.contains(&order.payment_status) {
            return Ok(false);
        }
        order.payment_status = transition.to;
        if transition.transaction_id.is_some() {
            order.payment_transaction_id = transition.transaction_id.clone();
        }
        if transition.failure_reason.is_some() {
            order.payment_failure_reason = transition.failure_reason.clone();
        }
        if transition.to == PaymentState::Paid {
            order.confirmed_at = Some(transition.at);
        }
        Ok(true)
    }

    async fn record_refund(&self, refund: &RefundRecord) -> PaymentResult<bool> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.get_mut(&(refund.store_id.clone(), refund.order_id)) else {
            return Ok(false);
        };
        if order.refund_amount != refund.expected_refunded || !order.payment_status.is_refundable() {
            return Ok(false);
        }
        order.refund_amount += refund.amount;
        order.payment_status = refund.new_status;
        order.refund_reason = refund.reason.clone();
        order.refunded_at = Some(refund.at);
        Ok(true)
    }
}
