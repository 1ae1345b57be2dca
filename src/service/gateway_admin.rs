use crate::domain::gateway::{AdminGatewayView, FeeType, GatewayConfig, GatewayName, GatewayType};
use crate::error::{PaymentError, PaymentResult};
use crate::repo::store::PaymentStore;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

/// Partial update of the admin-editable fields. Absent fields are left
/// alone; credentials are replaced field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayPatch {
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_logo: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_description: Option<Option<String>>,
    pub is_test_mode: Option<bool>,
    pub priority: Option<i32>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub merchant_id: Option<String>,
    pub settings: Option<serde_json::Value>,
    pub supported_currencies: Option<Vec<String>>,
    pub min_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_amount: Option<Option<Decimal>>,
    pub fee_type: Option<FeeType>,
    pub fee_rate: Option<Decimal>,
    pub fixed_fee: Option<Decimal>,
    pub supports_refunds: Option<bool>,
    pub supports_partial_refunds: Option<bool>,
    pub supports_recurring: Option<bool>,
    pub supports_preauth: Option<bool>,
    pub auto_capture: Option<bool>,
    pub payment_timeout: Option<i32>,
    pub retry_attempts: Option<i32>,
}

impl GatewayPatch {
    pub fn apply(self, gw: &mut GatewayConfig) {
        if let Some(v) = self.display_name {
            gw.display_name = v;
        }
        if let Some(v) = self.display_logo {
            gw.display_logo = v;
        }
        if let Some(v) = self.display_description {
            gw.display_description = v;
        }
        if let Some(v) = self.is_test_mode {
            gw.is_test_mode = v;
        }
        if let Some(v) = self.priority {
            gw.priority = v;
        }
        if let Some(v) = self.api_key {
            gw.credentials.api_key = Some(v);
        }
        if let Some(v) = self.api_secret {
            gw.credentials.api_secret = Some(v);
        }
        if let Some(v) = self.webhook_secret {
            gw.credentials.webhook_secret = Some(v);
        }
        if let Some(v) = self.merchant_id {
            gw.credentials.merchant_id = Some(v);
        }
        if let Some(v) = self.settings {
            gw.settings = v;
        }
        if let Some(v) = self.supported_currencies {
            gw.supported_currencies = v.into_iter().map(|c| c.trim().to_uppercase()).collect();
        }
        if let Some(v) = self.min_amount {
            gw.min_amount = v;
        }
        if let Some(v) = self.max_amount {
            gw.max_amount = v;
        }
        if let Some(v) = self.fee_type {
            gw.fee_type = v;
        }
        if let Some(v) = self.fee_rate {
            gw.fee_rate = v;
        }
        if let Some(v) = self.fixed_fee {
            gw.fixed_fee = v;
        }
        if let Some(v) = self.supports_refunds {
            gw.supports_refunds = v;
        }
        if let Some(v) = self.supports_partial_refunds {
            gw.supports_partial_refunds = v;
        }
        if let Some(v) = self.supports_recurring {
            gw.supports_recurring = v;
        }
        if let Some(v) = self.supports_preauth {
            gw.supports_preauth = v;
        }
        if let Some(v) = self.auto_capture {
            gw.auto_capture = v;
        }
        if let Some(v) = self.payment_timeout {
            gw.payment_timeout = v;
        }
        if let Some(v) = self.retry_attempts {
            gw.retry_attempts = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGateway {
    pub gateway_name: GatewayName,
    pub gateway_type: GatewayType,
    pub display_name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(flatten)]
    pub fields: GatewayPatch,
}

/// The set every new store starts with. Only cash on delivery is active,
/// since the others need credentials first.
pub fn default_gateways(store_id: &str) -> Vec<GatewayConfig> {
    let now = Utc::now();
    let stock = [
        (
            GatewayName::Razorpay,
            GatewayType::Online,
            "Razorpay",
            "Pay securely with cards, UPI, wallets & more",
            &["INR"][..],
            false,
        ),
        (
            GatewayName::Paypal,
            GatewayType::Online,
            "PayPal",
            "Pay with your PayPal account",
            &["USD", "EUR", "GBP"][..],
            false,
        ),
        (
            GatewayName::Phonepe,
            GatewayType::Wallet,
            "PhonePe",
            "Pay using PhonePe wallet",
            &["INR"][..],
            false,
        ),
        (
            GatewayName::Cod,
            GatewayType::Offline,
            "Cash on Delivery",
            "Pay when you receive your order",
            &["INR", "USD"][..],
            true,
        ),
    ];
    let count = stock.len() as i32;

    stock
        .into_iter()
        .enumerate()
        .map(|(i, (name, gateway_type, display_name, description, currencies, active))| {
            let mut gw = GatewayConfig::new(store_id, name.clone(), gateway_type, display_name, now);
            gw.display_description = Some(description.to_string());
            gw.display_logo = Some(format!("/static/payment-logos/{}.png", name));
            gw.supported_currencies = currencies.iter().map(|c| c.to_string()).collect();
            gw.priority = count - i as i32;
            if gateway_type == GatewayType::Offline {
                gw.supports_refunds = false;
                gw.supports_partial_refunds = false;
            }
            if active {
                gw.activate(now);
            }
            gw
        })
        .collect()
}

#[derive(Clone)]
pub struct GatewayAdmin {
    pub store: Arc<dyn PaymentStore>,
}

impl GatewayAdmin {
    pub async fn list(&self, store_id: &str, reveal_secrets: bool) -> PaymentResult<Vec<AdminGatewayView>> {
        Ok(self
            .store
            .list_gateways(store_id)
            .await?
            .iter()
            .map(|g| g.admin_view(reveal_secrets))
            .collect())
    }

    pub async fn get(&self, store_id: &str, name: &GatewayName) -> PaymentResult<AdminGatewayView> {
        Ok(self.load(store_id, name).await?.admin_view(false))
    }

    /// Inserts whichever stock gateways the store does not have yet.
    pub async fn create_defaults(&self, store_id: &str) -> PaymentResult<Vec<AdminGatewayView>> {
        let mut created = Vec::new();
        for gw in default_gateways(store_id) {
            if self.store.get_gateway(store_id, &gw.gateway_name).await?.is_some() {
                continue;
            }
            created.push(self.store.insert_gateway(gw).await?.admin_view(false));
        }
        tracing::info!("created {} default gateways for store {}", created.len(), store_id);
        Ok(created)
    }

    pub async fn create(&self, store_id: &str, new: NewGateway) -> PaymentResult<AdminGatewayView> {
        let now = Utc::now();
        let mut gw = GatewayConfig::new(store_id, new.gateway_name, new.gateway_type, &new.display_name, now);
        new.fields.apply(&mut gw);
        if new.is_active {
            gw.activate(now);
        }
        gw.validate().map_err(PaymentError::InvalidConfig)?;

        let gw = self.store.insert_gateway(gw).await?;
        tracing::info!("gateway {} created for store {}", gw.gateway_name, store_id);
        Ok(gw.admin_view(false))
    }

    pub async fn update(
        &self,
        store_id: &str,
        name: &GatewayName,
        patch: GatewayPatch,
    ) -> PaymentResult<AdminGatewayView> {
        let mut gw = self.load(store_id, name).await?;
        patch.apply(&mut gw);
        gw.updated_at = Utc::now();
        gw.validate().map_err(PaymentError::InvalidConfig)?;
        self.store.save_gateway(&gw).await?;
        Ok(gw.admin_view(false))
    }

    pub async fn set_active(&self, store_id: &str, name: &GatewayName, active: bool) -> PaymentResult<AdminGatewayView> {
        let mut gw = self.load(store_id, name).await?;
        if active {
            gw.activate(Utc::now());
        } else {
            gw.deactivate(Utc::now());
        }
        self.store.save_gateway(&gw).await?;
        tracing::info!(
            "gateway {} for store {} is now {}",
            name,
            store_id,
            if active { "active" } else { "inactive" }
        );
        Ok(gw.admin_view(false))
    }

    /// Assigns descending priorities following `order`; gateways not named
    /// keep their priority.
    pub async fn reorder(&self, store_id: &str, order: &[GatewayName]) -> PaymentResult<Vec<AdminGatewayView>> {
        let now = Utc::now();
        let top = order.len() as i32;
        for (i, name) in order.iter().enumerate() {
            let mut gw = self.load(store_id, name).await?;
            gw.priority = top - i as i32;
            gw.updated_at = now;
            self.store.save_gateway(&gw).await?;
        }
        self.list(store_id, false).await
    }

    pub async fn delete(&self, store_id: &str, name: &GatewayName) -> PaymentResult<()> {
        if !self.store.delete_gateway(store_id, name).await? {
            return Err(PaymentError::GatewayNotFound {
                gateway: name.to_string(),
            });
        }
        tracing::info!("gateway {} deleted from store {}", name, store_id);
        Ok(())
    }

    async fn load(&self, store_id: &str, name: &GatewayName) -> PaymentResult<GatewayConfig> {
        self.store
            .get_gateway(store_id, name)
            .await?
            .ok_or_else(|| PaymentError::GatewayNotFound {
                gateway: name.to_string(),
            })
    }
}
