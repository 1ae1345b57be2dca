use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::{Order, PaymentState};
use crate::domain::payment::{
    PaymentIntent, ProviderPaymentStatus, ProviderStatus, RefundResult, StateTransition,
    WebhookEvent,
};
use crate::error::{PaymentError, PaymentResult};
use crate::gateways::signing::{constant_time_eq, hmac_sha256_hex};
use crate::gateways::{
    call_timeout, credential, ensure_refundable, map_transport_error, read_json,
    refund_idempotency_key, required_str, GatewayAdapter,
};
use crate::money::AmountUnit;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;

/// Razorpay takes integer paise.
pub const AMOUNT_UNIT: AmountUnit = AmountUnit::Minor { multiplier: 100 };

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub struct RazorpayGateway {
    pub base_url: String,
    pub call_cap: Duration,
    pub client: reqwest::Client,
}

impl RazorpayGateway {
    fn auth<'a>(&self, config: &'a GatewayConfig) -> PaymentResult<(&'a str, &'a str)> {
        let name = GatewayName::Razorpay;
        Ok((
            credential(&name, &config.credentials.api_key, "api_key")?,
            credential(&name, &config.credentials.api_secret, "api_secret")?,
        ))
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for RazorpayGateway {
    fn name(&self) -> GatewayName {
        GatewayName::Razorpay
    }

    async fn create_order(&self, config: &GatewayConfig, order: &Order) -> PaymentResult<PaymentIntent> {
        let (key_id, key_secret) = self.auth(config)?;
        let amount_minor = AMOUNT_UNIT.to_minor(order.total_amount)?;

        let body = json!({
            "amount": amount_minor,
            "currency": order.currency,
            "receipt": order.order_number,
            "payment_capture": if config.auto_capture { 1 } else { 0 },
            "notes": {
                "store_id": order.store_id,
                "order_id": order.id.to_string(),
                "customer_email": order.customer_email.clone().unwrap_or_default(),
            }
        });

        let resp = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(key_id, Some(key_secret))
            .json(&body)
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;
        let razorpay_order_id = required_str(&self.name(), &v, "/id")?.to_string();

        Ok(PaymentIntent {
            payment_id: razorpay_order_id.clone(),
            checkout: json!({
                "key_id": key_id,
                "order_id": razorpay_order_id,
                "amount": amount_minor,
                "currency": order.currency,
                "name": config.display_name,
                "theme": { "color": config.setting_str("theme_color").unwrap_or("#3399cc") },
                "image": config.setting_str("checkout_logo").unwrap_or(""),
                "prefill": {
                    "name": order.customer_name.clone().unwrap_or_default(),
                    "email": order.customer_email.clone().unwrap_or_default(),
                    "contact": order.customer_phone.clone().unwrap_or_default(),
                }
            }),
        })
    }

    async fn verify_payment(
        &self,
        config: &GatewayConfig,
        payment_id: &str,
        payload: Option<&serde_json::Value>,
    ) -> PaymentResult<ProviderPaymentStatus> {
        let (key_id, key_secret) = self.auth(config)?;
        if let Some(payload) = payload.filter(|p| carries_checkout_fields(p)) {
            verify_checkout_signature(key_secret, payment_id, payload)?;
        }

        let resp = self
            .client
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .basic_auth(key_id, Some(key_secret))
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;

        let amount_minor = v
            .get("amount")
            .and_then(|a| a.as_i64())
            .ok_or_else(|| PaymentError::provider(self.name(), "payment response missing amount"))?;
        let status = match v.get("status").and_then(|s| s.as_str()).unwrap_or_default() {
            "captured" | "refunded" => ProviderStatus::Captured,
            "authorized" => ProviderStatus::Authorized,
            "failed" => ProviderStatus::Failed,
            "created" => ProviderStatus::Created,
            _ => ProviderStatus::Pending,
        };
        let id = required_str(&self.name(), &v, "/id")?.to_string();

        Ok(ProviderPaymentStatus {
            payment_id: id.clone(),
            order_reference: v.get("order_id").and_then(|o| o.as_str()).map(ToString::to_string),
            status,
            amount: AMOUNT_UNIT.from_minor(amount_minor),
            currency: required_str(&self.name(), &v, "/currency")?.to_string(),
            captured: v.get("captured").and_then(|c| c.as_bool()).unwrap_or(false),
            transaction_id: Some(id),
            method: v.get("method").and_then(|m| m.as_str()).map(ToString::to_string),
        })
    }

    async fn process_refund(
        &self,
        config: &GatewayConfig,
        order: &Order,
        refund_amount: Decimal,
        reason: Option<&str>,
    ) -> PaymentResult<RefundResult> {
        ensure_refundable(order, refund_amount)?;
        let (key_id, key_secret) = self.auth(config)?;
        let payment_id = order.payment_transaction_id.as_deref().ok_or_else(|| {
            PaymentError::InvalidState(format!("order {} has no captured razorpay payment", order.id))
        })?;

        let body = json!({
            "amount": AMOUNT_UNIT.to_minor(refund_amount)?,
            "speed": "normal",
            "receipt": refund_idempotency_key(order, refund_amount),
            "notes": {
                "reason": reason.unwrap_or("Refund requested"),
                "order_number": order.order_number,
            }
        });

        let resp = self
            .client
            .post(format!("{}/v1/payments/{}/refund", self.base_url, payment_id))
            .basic_auth(key_id, Some(key_secret))
            .json(&body)
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;

        Ok(RefundResult {
            refund_id: required_str(&self.name(), &v, "/id")?.to_string(),
            status: v
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("pending")
                .to_string(),
            amount: v
                .get("amount")
                .and_then(|a| a.as_i64())
                .map(|a| AMOUNT_UNIT.from_minor(a))
                .unwrap_or(refund_amount),
        })
    }

    fn handle_webhook(&self, config: &GatewayConfig, event: &WebhookEvent) -> PaymentResult<StateTransition> {
        if let Some(secret) = config.credentials.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
            let provided = event
                .header(SIGNATURE_HEADER)
                .ok_or_else(|| PaymentError::InvalidSignature("missing X-Razorpay-Signature".to_string()))?;
            let expected = hmac_sha256_hex(secret, event.body.as_bytes());
            if !constant_time_eq(&expected, provided) {
                return Err(PaymentError::InvalidSignature(
                    "webhook signature mismatch".to_string(),
                ));
            }
        }

        let v: serde_json::Value = serde_json::from_str(&event.body)
            .map_err(|e| PaymentError::provider(self.name(), format!("malformed webhook body: {}", e)))?;
        let event_type = v.get("event").and_then(|e| e.as_str()).unwrap_or_default().to_string();

        let transition = match event_type.clone().as_str() {
            "payment.captured" => {
                let entity = v.pointer("/payload/payment/entity").cloned().unwrap_or_default();
                StateTransition {
                    order_reference: Some(required_str(&self.name(), &entity, "/order_id")?.to_string()),
                    new_status: Some(PaymentState::Paid),
                    transaction_id: entity.get("id").and_then(|i| i.as_str()).map(ToString::to_string),
                    failure_reason: None,
                    event_type,
                }
            }
            "order.paid" => StateTransition {
                order_reference: Some(required_str(&self.name(), &v, "/payload/order/entity/id")?.to_string()),
                new_status: Some(PaymentState::Paid),
                transaction_id: v
                    .pointer("/payload/payment/entity/id")
                    .and_then(|i| i.as_str())
                    .map(ToString::to_string),
                failure_reason: None,
                event_type,
            },
            "payment.failed" => {
                let entity = v.pointer("/payload/payment/entity").cloned().unwrap_or_default();
                StateTransition {
                    order_reference: Some(required_str(&self.name(), &entity, "/order_id")?.to_string()),
                    new_status: Some(PaymentState::Failed),
                    transaction_id: None,
                    failure_reason: entity
                        .get("error_description")
                        .and_then(|d| d.as_str())
                        .map(ToString::to_string),
                    event_type,
                }
            }
            _ => StateTransition::no_op(event_type),
        };
        Ok(transition)
    }
}

/// Checkout handler signature: HMAC-SHA256(key_secret, "order_id|payment_id").
const CHECKOUT_FIELDS: [&str; 3] = ["razorpay_order_id", "razorpay_payment_id", "razorpay_signature"];

/// Any checkout handler field means the client is relaying a checkout
/// result, which must then be signed.
fn carries_checkout_fields(payload: &serde_json::Value) -> bool {
    CHECKOUT_FIELDS.iter().any(|f| payload.get(*f).is_some())
}

pub fn verify_checkout_signature(
    key_secret: &str,
    payment_id: &str,
    payload: &serde_json::Value,
) -> PaymentResult<()> {
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PaymentError::InvalidSignature(format!("missing {}", name)))
    };
    let order_id = field("razorpay_order_id")?;
    let signed_payment_id = field("razorpay_payment_id")?;
    let signature = field("razorpay_signature")?;

    if signed_payment_id != payment_id {
        return Err(PaymentError::InvalidSignature(
            "signature covers a different payment".to_string(),
        ));
    }
    let expected = hmac_sha256_hex(key_secret, format!("{}|{}", order_id, signed_payment_id).as_bytes());
    if !constant_time_eq(&expected, signature) {
        return Err(PaymentError::InvalidSignature("payment signature mismatch".to_string()));
    }
    Ok(())
}
