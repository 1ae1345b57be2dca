use crate::domain::gateway::{GatewayConfig, GatewayName, PublicGatewayView};
use crate::domain::order::{Order, PaymentState, ReferenceKey};
use crate::domain::payment::{
    CreatePaymentResponse, PaymentMethodView, ProviderStatus, RefundResponse,
    VerifyPaymentResponse, WebhookDisposition,
};
use crate::eligibility::{is_amount_supported, is_currency_supported, select_active_gateways};
use crate::error::{PaymentError, PaymentResult};
use crate::fees::calculate_fee;
use crate::gateways::{call_timeout, AdapterRegistry};
use crate::repo::store::{AttemptOutcome, AttemptRecord, OrderTransition, PaymentStore, RefundRecord};
use crate::service::order_locks::OrderLocks;
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct PaymentOrchestrator {
    pub store: Arc<dyn PaymentStore>,
    pub adapters: AdapterRegistry,
    pub locks: OrderLocks,
    pub call_cap: Duration,
}

/// A provider-reported state change to apply to one order.
#[derive(Debug, Clone)]
pub struct ProviderTransition {
    pub to: PaymentState,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl PaymentOrchestrator {
    pub fn new(store: Arc<dyn PaymentStore>, adapters: AdapterRegistry, call_cap: Duration) -> Self {
        Self {
            store,
            adapters,
            locks: OrderLocks::new(),
            call_cap,
        }
    }

    pub async fn create_payment_order(
        &self,
        store_id: &str,
        order_id: i64,
        gateway_name: &GatewayName,
    ) -> PaymentResult<CreatePaymentResponse> {
        let _guard = self.locks.lock(store_id, order_id).await;

        let order = self.load_order(store_id, order_id).await?;
        let gateway = self.load_gateway(store_id, gateway_name).await?;
        if !gateway.is_active {
            return Err(PaymentError::GatewayInactive {
                gateway: gateway_name.to_string(),
            });
        }
        if !is_amount_supported(&gateway, order.total_amount) {
            return Err(PaymentError::AmountNotSupported {
                amount: order.total_amount,
                min: gateway.min_amount,
                max: gateway.max_amount,
            });
        }
        if !is_currency_supported(&gateway, &order.currency) {
            return Err(PaymentError::CurrencyNotSupported {
                currency: order.currency.clone(),
                supported: gateway.supported_currencies.clone(),
            });
        }
        if !order.payment_status.is_payable() {
            return Err(PaymentError::InvalidState(format!(
                "order {} is {} and cannot start a payment",
                order.id,
                order.payment_status.as_str()
            )));
        }
        let adapter = self.adapters.resolve(gateway_name)?;

        let result = self
            .bounded(&gateway, adapter.create_order(&gateway, &order))
            .await;

        let mut attempt = AttemptRecord {
            store_id: store_id.to_string(),
            gateway_name: gateway_name.clone(),
            order_id,
            amount: order.total_amount,
            currency: order.currency.clone(),
            at: Utc::now(),
            outcome: AttemptOutcome::Failed,
        };

        let intent = match result {
            Ok(intent) => intent,
            Err(e) => {
                // The provider error is what the caller acts on; a lost
                // stats row is reported separately so it can be reconciled.
                if let Err(store_err) = self.store.record_attempt(&attempt).await {
                    tracing::error!(
                        "gateway stats not recorded: failed attempt for store {} order {} on {} ({} {}, {}): {}",
                        store_id,
                        order_id,
                        gateway_name,
                        attempt.amount,
                        attempt.currency,
                        e.code(),
                        store_err
                    );
                }
                tracing::warn!(
                    "create_order failed for order {} on {}: {} ({})",
                    order_id,
                    gateway_name,
                    e,
                    e.code()
                );
                return Err(e);
            }
        };

        attempt.outcome = AttemptOutcome::Succeeded {
            payment_reference: intent.payment_id.clone(),
            is_test_mode: gateway.is_test_mode,
        };
        let moved = self.store.record_attempt(&attempt).await.map_err(|e| {
            tracing::error!(
                "provider order {} created but order {} was not updated: {}",
                intent.payment_id,
                order_id,
                e
            );
            e
        })?;
        if !moved {
            return Err(PaymentError::InvalidState(format!(
                "order {} changed while its payment was being created",
                order_id
            )));
        }

        tracing::info!(
            "payment order created: store={} order={} gateway={} reference={}",
            store_id,
            order_id,
            gateway_name,
            intent.payment_id
        );
        Ok(CreatePaymentResponse {
            order_id,
            gateway_name: gateway_name.clone(),
            payment_status: PaymentState::AwaitingConfirmation,
            intent,
        })
    }

    /// Asks the provider for the payment's state and, when the order can be
    /// found by its provider reference, reconciles the order with it.
    pub async fn verify_payment(
        &self,
        store_id: &str,
        gateway_name: &GatewayName,
        payment_id: &str,
        payload: Option<&serde_json::Value>,
    ) -> PaymentResult<VerifyPaymentResponse> {
        let gateway = self.load_gateway(store_id, gateway_name).await?;
        let adapter = self.adapters.resolve(gateway_name)?;
        let status = self
            .bounded(&gateway, adapter.verify_payment(&gateway, payment_id, payload))
            .await?;

        let reference = status
            .order_reference
            .clone()
            .unwrap_or_else(|| payment_id.to_string());
        let Some(order) = self
            .store
            .find_order_by_reference(&ReferenceKey {
                store_id: store_id.to_string(),
                gateway_name: gateway_name.clone(),
                is_test_mode: gateway.is_test_mode,
                reference,
            })
            .await?
        else {
            return Ok(VerifyPaymentResponse {
                provider: status,
                order_id: None,
                payment_status: None,
            });
        };

        let transition = if status.captured || status.status == ProviderStatus::Captured {
            if status.amount != order.total_amount || !status.currency.eq_ignore_ascii_case(&order.currency) {
                tracing::warn!(
                    "verified amount {} {} does not match order {} total {} {}",
                    status.amount,
                    status.currency,
                    order.id,
                    order.total_amount,
                    order.currency
                );
                return Err(PaymentError::provider(
                    gateway_name,
                    format!(
                        "captured {} {} but order {} expects {} {}",
                        status.amount, status.currency, order.id, order.total_amount, order.currency
                    ),
                ));
            }
            Some(ProviderTransition {
                to: PaymentState::Paid,
                transaction_id: status.transaction_id.clone(),
                failure_reason: None,
            })
        } else if status.status == ProviderStatus::Failed {
            Some(ProviderTransition {
                to: PaymentState::Failed,
                transaction_id: None,
                failure_reason: Some(format!("{} reported the payment as failed", gateway_name)),
            })
        } else {
            None
        };

        let payment_status = match transition {
            Some(t) => self.apply_provider_transition(&order, &t).await?.1,
            None => order.payment_status,
        };
        Ok(VerifyPaymentResponse {
            provider: status,
            order_id: Some(order.id),
            payment_status: Some(payment_status),
        })
    }

    /// Moves an order to a provider-reported state. Re-applying a state the
    /// order already holds, or losing a race to another transition, is a
    /// no-op rather than an error.
    pub async fn apply_provider_transition(
        &self,
        order: &Order,
        transition: &ProviderTransition,
    ) -> PaymentResult<(WebhookDisposition, PaymentState)> {
        let _guard = self.locks.lock(&order.store_id, order.id).await;
        let current = self.load_order(&order.store_id, order.id).await?;

        if current.payment_status == transition.to {
            return Ok((WebhookDisposition::AlreadyApplied, current.payment_status));
        }

        let mut cas = OrderTransition::new(&order.store_id, order.id, transition.to, Utc::now());
        cas.transaction_id = transition.transaction_id.clone();
        cas.failure_reason = transition.failure_reason.clone();

        if !transition.to.allowed_sources().contains(&current.payment_status)
            || !self.store.transition_order(&cas).await?
        {
            tracing::warn!(
                "stale transition for order {}: {} -> {} not applied",
                order.id,
                current.payment_status.as_str(),
                transition.to.as_str()
            );
            let latest = self.load_order(&order.store_id, order.id).await?;
            return Ok((WebhookDisposition::Stale, latest.payment_status));
        }

        tracing::info!(
            "order {} moved {} -> {}",
            order.id,
            current.payment_status.as_str(),
            transition.to.as_str()
        );
        Ok((WebhookDisposition::Applied, transition.to))
    }

    pub async fn process_refund(
        &self,
        store_id: &str,
        order_id: i64,
        refund_amount: Decimal,
        reason: Option<&str>,
        gateway_name: Option<&GatewayName>,
    ) -> PaymentResult<RefundResponse> {
        if refund_amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidRefundAmount(format!(
                "refund amount must be positive, got {}",
                refund_amount
            )));
        }

        let _guard = self.locks.lock(store_id, order_id).await;
        let order = self.load_order(store_id, order_id).await?;

        let remaining = order.refundable_amount();
        if refund_amount > remaining {
            return Err(PaymentError::InvalidRefundAmount(format!(
                "refund amount {} exceeds refundable balance {} of order {}",
                refund_amount, remaining, order.id
            )));
        }
        if !order.payment_status.is_refundable() {
            return Err(PaymentError::InvalidState(format!(
                "order {} is {}; only paid orders can be refunded",
                order.id,
                order.payment_status.as_str()
            )));
        }

        let gateway_name = gateway_name
            .cloned()
            .or_else(|| order.payment_gateway.clone())
            .ok_or_else(|| {
                PaymentError::InvalidState(format!("order {} has no payment gateway", order.id))
            })?;
        let gateway = self.load_gateway(store_id, &gateway_name).await?;
        if !gateway.supports_refunds {
            return Err(PaymentError::Unsupported(format!(
                "refunds are not supported by {}",
                gateway_name
            )));
        }
        let cumulative = order.refund_amount + refund_amount;
        if cumulative != order.total_amount && !gateway.supports_partial_refunds {
            return Err(PaymentError::Unsupported(format!(
                "partial refunds are not supported by {}",
                gateway_name
            )));
        }
        let adapter = self.adapters.resolve(&gateway_name)?;

        let refund = self
            .bounded(&gateway, adapter.process_refund(&gateway, &order, refund_amount, reason))
            .await
            .map_err(|e| {
                tracing::warn!("refund of {} on order {} failed: {}", refund_amount, order.id, e);
                e
            })?;

        let new_status = if cumulative == order.total_amount {
            PaymentState::Refunded
        } else {
            PaymentState::PartiallyRefunded
        };
        let recorded = self
            .store
            .record_refund(&RefundRecord {
                store_id: store_id.to_string(),
                order_id,
                expected_refunded: order.refund_amount,
                amount: refund_amount,
                new_status,
                reason: reason.map(ToString::to_string),
                at: Utc::now(),
            })
            .await?;
        if !recorded {
            tracing::error!(
                "refund {} succeeded at {} but order {} changed concurrently",
                refund.refund_id,
                gateway_name,
                order.id
            );
            return Err(PaymentError::Conflict(format!(
                "order {} changed while refund {} was processed",
                order.id, refund.refund_id
            )));
        }

        tracing::info!(
            "refund {} of {} recorded on order {} ({})",
            refund.refund_id,
            refund_amount,
            order.id,
            new_status.as_str()
        );
        Ok(RefundResponse {
            order_id,
            refund,
            payment_status: new_status,
            refund_amount: cumulative,
        })
    }

    /// Active gateways able to take `currency` (and `amount`, when given),
    /// priority order, with the fee each would charge.
    pub async fn get_payment_methods(
        &self,
        store_id: &str,
        amount: Option<Decimal>,
        currency: &str,
    ) -> PaymentResult<Vec<PaymentMethodView>> {
        let active = self.store.list_active_gateways(store_id).await?;
        select_active_gateways(active, Some(currency))
            .into_iter()
            .filter(|g| amount.map_or(true, |a| is_amount_supported(g, a)))
            .map(|g| {
                let transaction_fees = match amount {
                    Some(a) => calculate_fee(&g, a)?,
                    None => Decimal::ZERO,
                };
                Ok(PaymentMethodView {
                    gateway_name: g.gateway_name.clone(),
                    display_name: g.display_name.clone(),
                    gateway_type: g.gateway_type,
                    logo: g.display_logo.clone(),
                    description: g.display_description.clone(),
                    transaction_fees,
                    supports_refunds: g.supports_refunds,
                    estimated_time: g.payment_timeout,
                    min_amount: g.min_amount,
                    max_amount: g.max_amount,
                })
            })
            .collect()
    }

    pub async fn list_active_gateways(
        &self,
        store_id: &str,
        currency: Option<&str>,
    ) -> PaymentResult<Vec<PublicGatewayView>> {
        let active = self.store.list_active_gateways(store_id).await?;
        Ok(select_active_gateways(active, currency)
            .iter()
            .map(GatewayConfig::public_view)
            .collect())
    }

    pub(crate) async fn load_gateway(
        &self,
        store_id: &str,
        gateway_name: &GatewayName,
    ) -> PaymentResult<GatewayConfig> {
        self.store
            .get_gateway(store_id, gateway_name)
            .await?
            .ok_or_else(|| PaymentError::GatewayNotFound {
                gateway: gateway_name.to_string(),
            })
    }

    async fn load_order(&self, store_id: &str, order_id: i64) -> PaymentResult<Order> {
        self.store
            .get_order(store_id, order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound { order_id })
    }

    /// Runs one adapter call under the gateway's timeout. Expiry is
    /// transient: the provider may still have acted.
    async fn bounded<T>(
        &self,
        gateway: &GatewayConfig,
        call: impl Future<Output = PaymentResult<T>>,
    ) -> PaymentResult<T> {
        let limit = call_timeout(gateway, self.call_cap);
        tokio::time::timeout(limit, call).await.map_err(|_| {
            PaymentError::transient(
                &gateway.gateway_name,
                format!("no response within {}ms", limit.as_millis()),
            )
        })?
    }
}
