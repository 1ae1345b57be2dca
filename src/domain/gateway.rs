use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GatewayName {
    Razorpay,
    Paypal,
    Phonepe,
    Cod,
    Other(String),
}

impl GatewayName {
    pub fn as_str(&self) -> &str {
        match self {
            GatewayName::Razorpay => "razorpay",
            GatewayName::Paypal => "paypal",
            GatewayName::Phonepe => "phonepe",
            GatewayName::Cod => "cod",
            GatewayName::Other(name) => name.as_str(),
        }
    }
}

impl From<String> for GatewayName {
    fn from(value: String) -> Self {
        GatewayName::from(value.as_str())
    }
}

impl From<&str> for GatewayName {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "razorpay" => GatewayName::Razorpay,
            "paypal" => GatewayName::Paypal,
            "phonepe" => GatewayName::Phonepe,
            "cod" => GatewayName::Cod,
            other => GatewayName::Other(other.to_string()),
        }
    }
}

impl From<GatewayName> for String {
    fn from(value: GatewayName) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for GatewayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayType {
    Online,
    Offline,
    Wallet,
}

impl GatewayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayType::Online => "online",
            GatewayType::Offline => "offline",
            GatewayType::Wallet => "wallet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(GatewayType::Online),
            "offline" => Some(GatewayType::Offline),
            "wallet" => Some(GatewayType::Wallet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Percentage,
    Fixed,
    Mixed,
}

impl FeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::Percentage => "percentage",
            FeeType::Fixed => "fixed",
            FeeType::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(FeeType::Percentage),
            "fixed" => Some(FeeType::Fixed),
            "mixed" => Some(FeeType::Mixed),
            _ => None,
        }
    }
}

/// Provider credentials. `Debug` redacts values; nothing here is serialized
/// into a projection unless an admin explicitly asks for it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCredentials {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "***" } else { "<unset>" };
        f.debug_struct("GatewayCredentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .field("webhook_secret", &mask(&self.webhook_secret))
            .field("merchant_id", &mask(&self.merchant_id))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayStats {
    pub total_transactions: i64,
    pub failed_transactions: i64,
    pub total_amount_processed: Decimal,
    /// Successful volume split by currency; `total_amount_processed` sums
    /// across currencies and is only meaningful for single-currency gateways.
    pub processed_by_currency: BTreeMap<String, Decimal>,
    pub last_transaction_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub id: i64,
    pub store_id: String,
    pub gateway_name: GatewayName,
    pub gateway_type: GatewayType,
    pub display_name: String,
    pub display_logo: Option<String>,
    pub display_description: Option<String>,
    pub is_active: bool,
    pub is_test_mode: bool,
    pub priority: i32,
    pub credentials: GatewayCredentials,
    pub settings: serde_json::Value,
    pub supported_currencies: Vec<String>,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub fee_type: FeeType,
    pub fee_rate: Decimal,
    pub fixed_fee: Decimal,
    pub supports_refunds: bool,
    pub supports_partial_refunds: bool,
    pub supports_recurring: bool,
    pub supports_preauth: bool,
    pub auto_capture: bool,
    pub payment_timeout: i32,
    pub retry_attempts: i32,
    pub stats: GatewayStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl GatewayConfig {
    /// A fresh, inactive test-mode configuration with the stock limits
    /// (min 0.01, no max, zero fees, refunds supported).
    pub fn new(
        store_id: &str,
        gateway_name: GatewayName,
        gateway_type: GatewayType,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            store_id: store_id.to_string(),
            gateway_name,
            gateway_type,
            display_name: display_name.to_string(),
            display_logo: None,
            display_description: None,
            is_active: false,
            is_test_mode: true,
            priority: 0,
            credentials: GatewayCredentials::default(),
            settings: serde_json::json!({}),
            supported_currencies: vec!["USD".to_string()],
            min_amount: Decimal::new(1, 2),
            max_amount: None,
            fee_type: FeeType::Percentage,
            fee_rate: Decimal::ZERO,
            fixed_fee: Decimal::ZERO,
            supports_refunds: true,
            supports_partial_refunds: true,
            supports_recurring: false,
            supports_preauth: false,
            auto_capture: true,
            payment_timeout: 900,
            retry_attempts: 3,
            stats: GatewayStats::default(),
            created_at: now,
            updated_at: now,
            activated_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_amount < Decimal::ZERO {
            return Err("min_amount must be >= 0".to_string());
        }
        if let Some(max) = self.max_amount {
            if max < self.min_amount {
                return Err(format!(
                    "max_amount {} must be >= min_amount {}",
                    max, self.min_amount
                ));
            }
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(format!("fee_rate {} must be within [0, 1)", self.fee_rate));
        }
        if self.fixed_fee < Decimal::ZERO {
            return Err("fixed_fee must be >= 0".to_string());
        }
        if self.payment_timeout <= 0 {
            return Err("payment_timeout must be > 0".to_string());
        }
        if self.retry_attempts < 0 {
            return Err("retry_attempts must be >= 0".to_string());
        }
        if self.stats.failed_transactions > self.stats.total_transactions {
            return Err("failed_transactions exceeds total_transactions".to_string());
        }
        Ok(())
    }

    /// Percentage of attempts that did not fail, rounded to 2 dp.
    pub fn success_rate(&self) -> f64 {
        if self.stats.total_transactions == 0 {
            return 0.0;
        }
        let ok = (self.stats.total_transactions - self.stats.failed_transactions) as f64;
        let pct = ok / self.stats.total_transactions as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        if self.activated_at.is_none() {
            self.activated_at = Some(now);
        }
        self.updated_at = now;
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn public_view(&self) -> PublicGatewayView {
        PublicGatewayView {
            id: self.id,
            gateway_name: self.gateway_name.clone(),
            gateway_type: self.gateway_type,
            display_name: self.display_name.clone(),
            is_active: self.is_active,
            supported_currencies: self.supported_currencies.clone(),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            display_logo: self.display_logo.clone(),
            display_description: self.display_description.clone(),
            supports_refunds: self.supports_refunds,
            payment_timeout: self.payment_timeout,
        }
    }

    pub fn admin_view(&self, reveal_secrets: bool) -> AdminGatewayView {
        AdminGatewayView {
            id: self.id,
            store_id: self.store_id.clone(),
            gateway_name: self.gateway_name.clone(),
            gateway_type: self.gateway_type,
            display_name: self.display_name.clone(),
            is_active: self.is_active,
            is_test_mode: self.is_test_mode,
            priority: self.priority,
            credentials: CredentialsView::from_credentials(&self.credentials, reveal_secrets),
            settings: self.settings.clone(),
            supported_currencies: self.supported_currencies.clone(),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            fee_type: self.fee_type,
            fee_rate: self.fee_rate,
            fixed_fee: self.fixed_fee,
            supports_refunds: self.supports_refunds,
            supports_partial_refunds: self.supports_partial_refunds,
            supports_recurring: self.supports_recurring,
            supports_preauth: self.supports_preauth,
            auto_capture: self.auto_capture,
            payment_timeout: self.payment_timeout,
            retry_attempts: self.retry_attempts,
            stats: self.stats.clone(),
            success_rate: self.success_rate(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            activated_at: self.activated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicGatewayView {
    pub id: i64,
    pub gateway_name: GatewayName,
    pub gateway_type: GatewayType,
    pub display_name: String,
    pub is_active: bool,
    pub supported_currencies: Vec<String>,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub display_logo: Option<String>,
    pub display_description: Option<String>,
    pub supports_refunds: bool,
    pub payment_timeout: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialsView {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
    pub has_api_secret: bool,
    pub has_webhook_secret: bool,
}

impl CredentialsView {
    fn from_credentials(c: &GatewayCredentials, reveal: bool) -> Self {
        Self {
            api_key: c.api_key.clone(),
            api_secret: if reveal { c.api_secret.clone() } else { None },
            webhook_secret: if reveal { c.webhook_secret.clone() } else { None },
            merchant_id: c.merchant_id.clone(),
            has_api_secret: c.api_secret.is_some(),
            has_webhook_secret: c.webhook_secret.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminGatewayView {
    pub id: i64,
    pub store_id: String,
    pub gateway_name: GatewayName,
    pub gateway_type: GatewayType,
    pub display_name: String,
    pub is_active: bool,
    pub is_test_mode: bool,
    pub priority: i32,
    pub credentials: CredentialsView,
    pub settings: serde_json::Value,
    pub supported_currencies: Vec<String>,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub fee_type: FeeType,
    pub fee_rate: Decimal,
    pub fixed_fee: Decimal,
    pub supports_refunds: bool,
    pub supports_partial_refunds: bool,
    pub supports_recurring: bool,
    pub supports_preauth: bool,
    pub auto_capture: bool,
    pub payment_timeout: i32,
    pub retry_attempts: i32,
    pub stats: GatewayStats,
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::new("s1", GatewayName::Razorpay, GatewayType::Online, "Razorpay", Utc::now())
    }

    #[test]
    fn gateway_name_parses_case_insensitively() {
        assert_eq!(GatewayName::from("RazorPay"), GatewayName::Razorpay);
        assert_eq!(GatewayName::from("stripe"), GatewayName::Other("stripe".to_string()));
        let json = serde_json::to_string(&GatewayName::Phonepe).unwrap();
        assert_eq!(json, "\"phonepe\"");
    }

    #[test]
    fn activation_timestamp_is_set_once() {
        let mut gw = config();
        let first = Utc::now();
        gw.activate(first);
        gw.deactivate(first + chrono::Duration::seconds(5));
        gw.activate(first + chrono::Duration::seconds(10));
        assert!(gw.is_active);
        assert_eq!(gw.activated_at, Some(first));
    }

    #[test]
    fn validate_rejects_inverted_limits_and_full_fee_rate() {
        let mut gw = config();
        gw.min_amount = Decimal::new(100, 0);
        gw.max_amount = Some(Decimal::new(10, 0));
        assert!(gw.validate().is_err());

        let mut gw = config();
        gw.fee_rate = Decimal::ONE;
        assert!(gw.validate().is_err());

        assert!(config().validate().is_ok());
    }

    #[test]
    fn success_rate_is_percent_of_non_failed() {
        let mut gw = config();
        assert_eq!(gw.success_rate(), 0.0);
        gw.stats.total_transactions = 3;
        gw.stats.failed_transactions = 1;
        assert_eq!(gw.success_rate(), 66.67);
    }

    #[test]
    fn projections_hide_secrets() {
        let mut gw = config();
        gw.credentials.api_key = Some("rzp_key".to_string());
        gw.credentials.api_secret = Some("shh".to_string());

        let public = serde_json::to_value(gw.public_view()).unwrap();
        assert!(public.get("credentials").is_none());
        assert!(public.get("stats").is_none());

        let admin = gw.admin_view(false);
        assert_eq!(admin.credentials.api_secret, None);
        assert!(admin.credentials.has_api_secret);
        assert_eq!(gw.admin_view(true).credentials.api_secret.as_deref(), Some("shh"));
        assert!(!format!("{:?}", gw.credentials).contains("shh"));
    }
}
