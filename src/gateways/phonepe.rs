use crate::domain::gateway::{GatewayConfig, GatewayName};
use crate::domain::order::{Order, PaymentState};
use crate::domain::payment::{
    PaymentIntent, ProviderPaymentStatus, ProviderStatus, RefundResult, StateTransition,
    WebhookEvent,
};
use crate::error::{PaymentError, PaymentResult};
use crate::gateways::signing::{constant_time_eq, sha256_hex};
use crate::gateways::{
    call_timeout, credential, ensure_refundable, map_transport_error, read_json,
    refund_idempotency_key, required_str, GatewayAdapter,
};
use crate::money::AmountUnit;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;

pub const AMOUNT_UNIT: AmountUnit = AmountUnit::Minor { multiplier: 100 };

pub const VERIFY_HEADER: &str = "x-verify";
/// PhonePe settles in rupees only; status responses carry no currency.
pub const CURRENCY: &str = "INR";
const PAY_PATH: &str = "/pg/v1/pay";
const REFUND_PATH: &str = "/pg/v1/refund";

pub struct PhonepeGateway {
    pub live_url: String,
    pub sandbox_url: String,
    pub public_base_url: String,
    pub call_cap: Duration,
    pub client: reqwest::Client,
}

/// Merchant id, salt key and salt index for one store's PhonePe account.
struct Account<'a> {
    merchant_id: &'a str,
    salt: &'a str,
    salt_index: &'a str,
}

impl<'a> Account<'a> {
    fn from_config(config: &'a GatewayConfig) -> PaymentResult<Self> {
        let name = GatewayName::Phonepe;
        Ok(Self {
            merchant_id: credential(&name, &config.credentials.merchant_id, "merchant_id")?,
            salt: credential(&name, &config.credentials.api_secret, "api_secret")?,
            salt_index: config.setting_str("salt_index").unwrap_or("1"),
        })
    }

    /// `sha256(payload + salt) + "###" + salt_index`
    fn x_verify(&self, payload: &str) -> String {
        format!(
            "{}###{}",
            sha256_hex(format!("{}{}", payload, self.salt).as_bytes()),
            self.salt_index
        )
    }
}

impl PhonepeGateway {
    fn base_url(&self, config: &GatewayConfig) -> &str {
        if config.is_test_mode {
            &self.sandbox_url
        } else {
            &self.live_url
        }
    }

    async fn post_signed(
        &self,
        config: &GatewayConfig,
        account: &Account<'_>,
        path: &str,
        payload: &serde_json::Value,
    ) -> PaymentResult<serde_json::Value> {
        let encoded = BASE64.encode(payload.to_string());
        let resp = self
            .client
            .post(format!("{}{}", self.base_url(config), path))
            .header("X-VERIFY", account.x_verify(&format!("{}{}", encoded, path)))
            .json(&json!({ "request": encoded }))
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;
        if !v.get("success").and_then(|s| s.as_bool()).unwrap_or(false) {
            let code = v.get("code").and_then(|c| c.as_str()).unwrap_or("UNKNOWN");
            let message = v.get("message").and_then(|m| m.as_str()).unwrap_or_default();
            return Err(PaymentError::provider(self.name(), format!("{}: {}", code, message)));
        }
        Ok(v)
    }
}

fn status_from_code(code: &str) -> ProviderStatus {
    match code {
        "PAYMENT_SUCCESS" => ProviderStatus::Captured,
        "PAYMENT_ERROR" | "PAYMENT_DECLINED" | "TIMED_OUT" => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for PhonepeGateway {
    fn name(&self) -> GatewayName {
        GatewayName::Phonepe
    }

    async fn create_order(&self, config: &GatewayConfig, order: &Order) -> PaymentResult<PaymentIntent> {
        let account = Account::from_config(config)?;
        let amount_minor = AMOUNT_UNIT.to_minor(order.total_amount)?;
        let merchant_user_id = order
            .customer_email
            .clone()
            .unwrap_or_else(|| format!("{}-{}", order.store_id, order.id));

        let payload = json!({
            "merchantId": account.merchant_id,
            "merchantTransactionId": order.order_number,
            "merchantUserId": merchant_user_id,
            "amount": amount_minor,
            "redirectUrl": format!("{}/payment/phonepe/callback?order_id={}", self.public_base_url, order.id),
            "redirectMode": "REDIRECT",
            "callbackUrl": format!("{}/stores/{}/webhooks/phonepe", self.public_base_url, order.store_id),
            "mobileNumber": order.customer_phone.clone().unwrap_or_default(),
            "paymentInstrument": { "type": "PAY_PAGE" },
        });

        let v = self.post_signed(config, &account, PAY_PATH, &payload).await?;
        let redirect_url =
            required_str(&self.name(), &v, "/data/instrumentResponse/redirectInfo/url")?.to_string();

        Ok(PaymentIntent {
            payment_id: order.order_number.clone(),
            checkout: json!({
                "merchant_transaction_id": order.order_number,
                "redirect_url": redirect_url,
            }),
        })
    }

    async fn verify_payment(
        &self,
        config: &GatewayConfig,
        payment_id: &str,
        _payload: Option<&serde_json::Value>,
    ) -> PaymentResult<ProviderPaymentStatus> {
        let account = Account::from_config(config)?;
        let path = format!("/pg/v1/status/{}/{}", account.merchant_id, payment_id);

        let resp = self
            .client
            .get(format!("{}{}", self.base_url(config), path))
            .header("X-VERIFY", account.x_verify(&path))
            .header("X-MERCHANT-ID", account.merchant_id)
            .timeout(call_timeout(config, self.call_cap))
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name(), e))?;
        let v = read_json(&self.name(), resp).await?;

        let status = status_from_code(v.get("code").and_then(|c| c.as_str()).unwrap_or_default());
        let amount_minor = v
            .pointer("/data/amount")
            .and_then(|a| a.as_i64())
            .ok_or_else(|| PaymentError::provider(self.name(), "status response missing amount"))?;
        let transaction_id = v
            .pointer("/data/transactionId")
            .and_then(|t| t.as_str())
            .map(ToString::to_string);

        Ok(ProviderPaymentStatus {
            payment_id: payment_id.to_string(),
            order_reference: Some(payment_id.to_string()),
            status,
            amount: AMOUNT_UNIT.from_minor(amount_minor),
            currency: CURRENCY.to_string(),
            captured: status == ProviderStatus::Captured,
            transaction_id,
            method: v
                .pointer("/data/paymentInstrument/type")
                .and_then(|m| m.as_str())
                .map(|m| m.to_lowercase()),
        })
    }

    async fn process_refund(
        &self,
        config: &GatewayConfig,
        order: &Order,
        refund_amount: Decimal,
        _reason: Option<&str>,
    ) -> PaymentResult<RefundResult> {
        ensure_refundable(order, refund_amount)?;
        let account = Account::from_config(config)?;
        let original = order
            .payment_reference
            .as_deref()
            .unwrap_or(order.order_number.as_str());
        // PhonePe transaction ids only allow alphanumerics, '-' and '_'.
        let refund_txn = refund_idempotency_key(order, refund_amount).replace('.', "_");

        let payload = json!({
            "merchantId": account.merchant_id,
            "merchantUserId": order.customer_email.clone().unwrap_or_default(),
            "originalTransactionId": original,
            "merchantTransactionId": refund_txn,
            "amount": AMOUNT_UNIT.to_minor(refund_amount)?,
            "callbackUrl": format!("{}/stores/{}/webhooks/phonepe", self.public_base_url, order.store_id),
        });

        let v = self.post_signed(config, &account, REFUND_PATH, &payload).await?;
        Ok(RefundResult {
            refund_id: v
                .pointer("/data/transactionId")
                .and_then(|t| t.as_str())
                .map(ToString::to_string)
                .unwrap_or(refund_txn),
            status: v
                .pointer("/data/state")
                .and_then(|s| s.as_str())
                .unwrap_or("PENDING")
                .to_lowercase(),
            amount: refund_amount,
        })
    }

    /// Server-to-server callbacks are always signed; a missing or wrong
    /// X-VERIFY is rejected.
    fn handle_webhook(&self, config: &GatewayConfig, event: &WebhookEvent) -> PaymentResult<StateTransition> {
        let account = Account::from_config(config)?;
        let envelope: serde_json::Value = serde_json::from_str(&event.body)
            .map_err(|e| PaymentError::provider(self.name(), format!("malformed callback body: {}", e)))?;
        let encoded = envelope
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| PaymentError::InvalidSignature("callback has no response field".to_string()))?;
        let provided = event
            .header(VERIFY_HEADER)
            .ok_or_else(|| PaymentError::InvalidSignature("missing X-VERIFY".to_string()))?;
        if !constant_time_eq(&account.x_verify(encoded), provided) {
            return Err(PaymentError::InvalidSignature("callback checksum mismatch".to_string()));
        }

        let decoded = BASE64
            .decode(encoded)
            .map_err(|e| PaymentError::provider(self.name(), format!("callback is not base64: {}", e)))?;
        let v: serde_json::Value = serde_json::from_slice(&decoded)
            .map_err(|e| PaymentError::provider(self.name(), format!("callback is not json: {}", e)))?;

        let code = v.get("code").and_then(|c| c.as_str()).unwrap_or_default().to_string();
        let new_status = match status_from_code(&code) {
            ProviderStatus::Captured => PaymentState::Paid,
            ProviderStatus::Failed => PaymentState::Failed,
            _ => return Ok(StateTransition::no_op(code)),
        };
        let failure_reason = (new_status == PaymentState::Failed).then(|| {
            v.get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(code.as_str())
                .to_string()
        });

        Ok(StateTransition {
            order_reference: Some(
                required_str(&self.name(), &v, "/data/merchantTransactionId")?.to_string(),
            ),
            new_status: Some(new_status),
            transaction_id: v
                .pointer("/data/transactionId")
                .and_then(|t| t.as_str())
                .map(ToString::to_string),
            failure_reason,
            event_type: code,
        })
    }
}
