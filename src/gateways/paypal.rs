use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::{Order, PaymentState};
use crate::domain::payment::{
    PaymentIntent, ProviderPaymentStatus, ProviderStatus, RefundResult, StateTransition,
    WebhookEvent,
};
use crate::error::{PaymentError, PaymentResult};
use crate::gateways::{
    call_timeout, credential, ensure_refundable, map_transport_error, read_json,
    refund_idempotency_key, required_str, GatewayAdapter,
};
use crate::money::AmountUnit;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;

/// PayPal takes decimal strings with two places ("500.00").
pub const AMOUNT_UNIT: AmountUnit = AmountUnit::Major { scale: 2 };

pub struct PaypalGateway {
    pub live_url: String,
    pub sandbox_url: String,
    pub public_base_url: String,
    pub call_cap: Duration,
    pub client: reqwest::Client,
}

impl PaypalGateway {
    fn base_url(&self, config: &GatewayConfig) -> &str {
        if config.is_test_mode {
            &self.sandbox_url
        } else {
            &self.live_url
        }
    }

    async fn access_token(&self, config: &GatewayConfig) -> PaymentResult<String> {
        let name = self.name();
        let client_id = credential(&name, &config.credentials.api_key, "api_key")?;
        let client_secret = credential(&name, &config.credentials.api_secret, "api_secret")?;

        let resp = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url(config)))
            .basic_auth(client_id, Some(client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&name, e))?;
        let v = read_json(&name, resp).await?;
        Ok(required_str(&name, &v, "/access_token")?.to_string())
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for PaypalGateway {
    fn name(&self) -> GatewayName {
        GatewayName::Paypal
    }

    async fn create_order(&self, config: &GatewayConfig, order: &Order) -> PaymentResult<PaymentIntent> {
        let value = AMOUNT_UNIT.to_major_string(order.total_amount)?;
        let token = self.access_token(config).await?;

        let body = json!({
            "intent": if config.auto_capture { "CAPTURE" } else { "AUTHORIZE" },
            "purchase_units": [{
                "reference_id": order.order_number,
                "description": format!("Order {}", order.order_number),
                "amount": { "currency_code": order.currency, "value": value },
            }],
            "application_context": {
                "brand_name": config.display_name,
                "user_action": "PAY_NOW",
                "return_url": format!("{}/payment/success?order_id={}", self.public_base_url, order.id),
                "cancel_url": format!("{}/payment/cancel?order_id={}", self.public_base_url, order.id),
            }
        });

        let resp = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url(config)))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", order.order_number.as_str())
            .json(&body)
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;

        let paypal_order_id = required_str(&self.name(), &v, "/id")?.to_string();
        let approval_url = v
            .get("links")
            .and_then(|l| l.as_array())
            .and_then(|links| {
                links
                    .iter()
                    .find(|l| l.get("rel").and_then(|r| r.as_str()) == Some("approve"))
            })
            .and_then(|l| l.get("href"))
            .and_then(|h| h.as_str())
            .ok_or_else(|| PaymentError::provider(self.name(), "order response has no approve link"))?;

        Ok(PaymentIntent {
            payment_id: paypal_order_id.clone(),
            checkout: json!({
                "paypal_order_id": paypal_order_id,
                "approval_url": approval_url,
                "status": v.get("status").cloned().unwrap_or_default(),
            }),
        })
    }

    async fn verify_payment(
        &self,
        config: &GatewayConfig,
        payment_id: &str,
        _payload: Option<&serde_json::Value>,
    ) -> PaymentResult<ProviderPaymentStatus> {
        let token = self.access_token(config).await?;
        let resp = self
            .client
            .get(format!("{}/v2/checkout/orders/{}", self.base_url(config), payment_id))
            .bearer_auth(&token)
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;

        let raw_status = v.get("status").and_then(|s| s.as_str()).unwrap_or_default();
        let authorize_only = v.get("intent").and_then(|i| i.as_str()) == Some("AUTHORIZE");
        let unit = v
            .pointer("/purchase_units/0")
            .cloned()
            .ok_or_else(|| PaymentError::provider(self.name(), "order has no purchase units"))?;
        let capture_status = unit
            .pointer("/payments/captures/0/status")
            .and_then(|s| s.as_str())
            .unwrap_or_default();
        // A completed order only means the buyer approved it; funds are
        // collected once the capture itself completes.
        let captured = !authorize_only && capture_status == "COMPLETED";
        let status = match raw_status {
            "COMPLETED" | "APPROVED" if authorize_only => ProviderStatus::Authorized,
            "COMPLETED" if captured => ProviderStatus::Captured,
            "COMPLETED" if capture_status == "DECLINED" || capture_status == "FAILED" => ProviderStatus::Failed,
            "COMPLETED" => ProviderStatus::Pending,
            "APPROVED" => ProviderStatus::Authorized,
            "VOIDED" => ProviderStatus::Failed,
            "CREATED" | "SAVED" => ProviderStatus::Created,
            _ => ProviderStatus::Pending,
        };
        let amount = match unit.pointer("/amount/value").and_then(|a| a.as_str()) {
            Some(value) => AMOUNT_UNIT.parse_major(value)?,
            None if !captured => Decimal::ZERO,
            None => return Err(PaymentError::provider(self.name(), "captured order has no amount")),
        };
        let currency = unit
            .pointer("/amount/currency_code")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        let transaction_id = if authorize_only {
            unit.pointer("/payments/authorizations/0/id")
        } else {
            unit.pointer("/payments/captures/0/id")
        };

        Ok(ProviderPaymentStatus {
            payment_id: required_str(&self.name(), &v, "/id")?.to_string(),
            order_reference: Some(required_str(&self.name(), &v, "/id")?.to_string()),
            status,
            amount,
            currency,
            captured,
            transaction_id: transaction_id.and_then(|t| t.as_str()).map(ToString::to_string),
            method: Some("paypal".to_string()),
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
        let capture_id = order.payment_transaction_id.as_deref().ok_or_else(|| {
            PaymentError::InvalidState(format!("order {} has no paypal capture to refund", order.id))
        })?;
        let value = AMOUNT_UNIT.to_major_string(refund_amount)?;
        let token = self.access_token(config).await?;
        let key = refund_idempotency_key(order, refund_amount);

        let body = json!({
            "amount": { "value": value, "currency_code": order.currency },
            "invoice_id": key,
            "note_to_payer": reason.unwrap_or("Refund requested"),
        });

        let resp = self
            .client
            .post(format!(
                "{}/v2/payments/captures/{}/refund",
                self.base_url(config),
                capture_id
            ))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", key.as_str())
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
                .unwrap_or("PENDING")
                .to_lowercase(),
            amount: v
                .pointer("/amount/value")
                .and_then(|a| a.as_str())
                .and_then(|a| AMOUNT_UNIT.parse_major(a).ok())
                .unwrap_or(refund_amount),
        })
    }

    /// PayPal signatures can only be checked with a round trip to its
    /// verification endpoint, so events are trusted here and reconciled by
    /// `verify_payment`.
    fn handle_webhook(&self, _config: &GatewayConfig, event: &WebhookEvent) -> PaymentResult<StateTransition> {
        let v: serde_json::Value = serde_json::from_str(&event.body)
            .map_err(|e| PaymentError::provider(self.name(), format!("malformed webhook body: {}", e)))?;
        let event_type = v
            .get("event_type")
            .and_then(|e| e.as_str())
            .unwrap_or_default()
            .to_string();
        let resource = v.get("resource").cloned().unwrap_or_default();
        let reference = || {
            required_str(&self.name(), &resource, "/supplementary_data/related_ids/order_id")
                .map(ToString::to_string)
        };

        let transition = match event_type.clone().as_str() {
            "PAYMENT.CAPTURE.COMPLETED" => StateTransition {
                order_reference: Some(reference()?),
                new_status: Some(PaymentState::Paid),
                transaction_id: resource.get("id").and_then(|i| i.as_str()).map(ToString::to_string),
                failure_reason: None,
                event_type,
            },
            "PAYMENT.CAPTURE.DENIED" => StateTransition {
                order_reference: Some(reference()?),
                new_status: Some(PaymentState::Failed),
                transaction_id: None,
                failure_reason: Some(
                    resource
                        .pointer("/status_details/reason")
                        .and_then(|r| r.as_str())
                        .unwrap_or("capture denied")
                        .to_string(),
                ),
                event_type,
            },
            _ => StateTransition::no_op(event_type),
        };
        Ok(transition)
    }
}
