use crate::domain::gateway::{
    FeeType, GatewayConfig, GatewayCredentials, GatewayName, GatewayStats, GatewayType,
};
use crate::domain::order::{Order, PaymentState, ReferenceKey};
use crate::error::{PaymentError, PaymentResult};
use crate::repo::store::{AttemptOutcome, AttemptRecord, OrderTransition, PaymentStore, RefundRecord};
use anyhow::anyhow;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const GATEWAY_COLUMNS: &str = r#"
    id, store_id, gateway_name, gateway_type, display_name, display_logo, display_description,
    is_active, is_test_mode, priority, api_key, api_secret, webhook_secret, merchant_id,
    settings, supported_currencies, min_amount, max_amount, fee_type, fee_rate, fixed_fee,
    supports_refunds, supports_partial_refunds, supports_recurring, supports_preauth,
    auto_capture, payment_timeout, retry_attempts, total_transactions, failed_transactions,
    total_amount_processed, last_transaction_at, created_at, updated_at, activated_at
"#;

const ORDER_COLUMNS: &str = r#"
    id, store_id, order_number, customer_name, customer_email, customer_phone, total_amount,
    currency, payment_status, payment_gateway, payment_reference, payment_test_mode,
    payment_transaction_id, payment_failure_reason, refund_amount, refund_reason, refunded_at,
    confirmed_at
"#;

#[derive(Clone)]
pub struct PgPaymentStore {
    pub pool: PgPool,
}

fn gateway_from_row(r: &PgRow) -> anyhow::Result<GatewayConfig> {
    let gateway_type: String = r.get("gateway_type");
    let fee_type: String = r.get("fee_type");
    Ok(GatewayConfig {
        id: r.get("id"),
        store_id: r.get("store_id"),
        gateway_name: GatewayName::from(r.get::<String, _>("gateway_name")),
        gateway_type: GatewayType::parse(&gateway_type)
            .ok_or_else(|| anyhow!("unknown gateway_type {}", gateway_type))?,
        display_name: r.get("display_name"),
        display_logo: r.get("display_logo"),
        display_description: r.get("display_description"),
        is_active: r.get("is_active"),
        is_test_mode: r.get("is_test_mode"),
        priority: r.get("priority"),
        credentials: GatewayCredentials {
            api_key: r.get("api_key"),
            api_secret: r.get("api_secret"),
            webhook_secret: r.get("webhook_secret"),
            merchant_id: r.get("merchant_id"),
        },
        settings: r.get("settings"),
        supported_currencies: r.get("supported_currencies"),
        min_amount: r.get("min_amount"),
        max_amount: r.get("max_amount"),
        fee_type: FeeType::parse(&fee_type).ok_or_else(|| anyhow!("unknown fee_type {}", fee_type))?,
        fee_rate: r.get("fee_rate"),
        fixed_fee: r.get("fixed_fee"),
        supports_refunds: r.get("supports_refunds"),
        supports_partial_refunds: r.get("supports_partial_refunds"),
        supports_recurring: r.get("supports_recurring"),
        supports_preauth: r.get("supports_preauth"),
        auto_capture: r.get("auto_capture"),
        payment_timeout: r.get("payment_timeout"),
        retry_attempts: r.get("retry_attempts"),
        stats: GatewayStats {
            total_transactions: r.get("total_transactions"),
            failed_transactions: r.get("failed_transactions"),
            total_amount_processed: r.get("total_amount_processed"),
            processed_by_currency: Default::default(),
            last_transaction_at: r.get("last_transaction_at"),
        },
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        activated_at: r.get("activated_at"),
    })
}

fn order_from_row(r: &PgRow) -> anyhow::Result<Order> {
    let status: String = r.get("payment_status");
    Ok(Order {
        id: r.get("id"),
        store_id: r.get("store_id"),
        order_number: r.get("order_number"),
        customer_name: r.get("customer_name"),
        customer_email: r.get("customer_email"),
        customer_phone: r.get("customer_phone"),
        total_amount: r.get("total_amount"),
        currency: r.get("currency"),
        payment_status: PaymentState::parse(&status)
            .ok_or_else(|| anyhow!("unknown payment_status {}", status))?,
        payment_gateway: r
            .get::<Option<String>, _>("payment_gateway")
            .map(GatewayName::from),
        payment_reference: r.get("payment_reference"),
        payment_test_mode: r.get("payment_test_mode"),
        payment_transaction_id: r.get("payment_transaction_id"),
        payment_failure_reason: r.get("payment_failure_reason"),
        refund_amount: r.get("refund_amount"),
        refund_reason: r.get("refund_reason"),
        refunded_at: r.get("refunded_at"),
        confirmed_at: r.get("confirmed_at"),
    })
}

impl PgPaymentStore {
    async fn load_gateways(&self, sql: &str, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        let rows = sqlx::query(sql).bind(store_id).fetch_all(&self.pool).await?;
        let mut gateways = rows
            .iter()
            .map(gateway_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.attach_currency_totals(&mut gateways).await?;
        Ok(gateways)
    }

    async fn attach_currency_totals(&self, gateways: &mut [GatewayConfig]) -> PaymentResult<()> {
        if gateways.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = gateways.iter().map(|g| g.id).collect();
        let rows = sqlx::query(
            "SELECT gateway_id, currency, amount_processed FROM gateway_currency_totals WHERE gateway_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for r in rows {
            let gateway_id: i64 = r.get("gateway_id");
            if let Some(g) = gateways.iter_mut().find(|g| g.id == gateway_id) {
                g.stats
                    .processed_by_currency
                    .insert(r.get("currency"), r.get::<Decimal, _>("amount_processed"));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PaymentStore for PgPaymentStore {
    async fn get_order(&self, store_id: &str, order_id: i64) -> PaymentResult<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE store_id = $1 AND id = $2",
            ORDER_COLUMNS
        ))
        .bind(store_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(order_from_row).transpose()?)
    }

    async fn find_order_by_reference(&self, key: &ReferenceKey) -> PaymentResult<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM orders
            WHERE store_id = $1 AND payment_gateway = $2
              AND COALESCE(payment_test_mode, false) = $3 AND payment_reference = $4
            ORDER BY id DESC
            LIMIT 1
            "#,
            ORDER_COLUMNS
        ))
        .bind(&key.store_id)
        .bind(key.gateway_name.as_str())
        .bind(key.is_test_mode)
        .bind(&key.reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(order_from_row).transpose()?)
    }

    async fn get_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<Option<GatewayConfig>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_gateways WHERE store_id = $1 AND gateway_name = $2",
            GATEWAY_COLUMNS
        ))
        .bind(store_id)
        .bind(gateway_name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut gateways = vec![gateway_from_row(&row)?];
        self.attach_currency_totals(&mut gateways).await?;
        Ok(gateways.pop())
    }

    async fn list_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        self.load_gateways(
            &format!(
                "SELECT {} FROM payment_gateways WHERE store_id = $1 ORDER BY id ASC",
                GATEWAY_COLUMNS
            ),
            store_id,
        )
        .await
    }

    async fn list_active_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        self.load_gateways(
            &format!(
                "SELECT {} FROM payment_gateways WHERE store_id = $1 AND is_active = true ORDER BY priority DESC, id ASC",
                GATEWAY_COLUMNS
            ),
            store_id,
        )
        .await
    }

    async fn insert_gateway(&self, mut config: GatewayConfig) -> PaymentResult<GatewayConfig> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_gateways (
                store_id, gateway_name, gateway_type, display_name, display_logo, display_description,
                is_active, is_test_mode, priority, api_key, api_secret, webhook_secret, merchant_id,
                settings, supported_currencies, min_amount, max_amount, fee_type, fee_rate, fixed_fee,
                supports_refunds, supports_partial_refunds, supports_recurring, supports_preauth,
                auto_capture, payment_timeout, retry_attempts, created_at, updated_at, activated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24,
                $25, $26, $27, $28, $29, $30
            )
            RETURNING id
            "#,
        )
        .bind(&config.store_id)
        .bind(config.gateway_name.as_str())
        .bind(config.gateway_type.as_str())
        .bind(&config.display_name)
        .bind(&config.display_logo)
        .bind(&config.display_description)
        .bind(config.is_active)
        .bind(config.is_test_mode)
        .bind(config.priority)
        .bind(&config.credentials.api_key)
        .bind(&config.credentials.api_secret)
        .bind(&config.credentials.webhook_secret)
        .bind(&config.credentials.merchant_id)
        .bind(&config.settings)
        .bind(&config.supported_currencies)
        .bind(config.min_amount)
        .bind(config.max_amount)
        .bind(config.fee_type.as_str())
        .bind(config.fee_rate)
        .bind(config.fixed_fee)
        .bind(config.supports_refunds)
        .bind(config.supports_partial_refunds)
        .bind(config.supports_recurring)
        .bind(config.supports_preauth)
        .bind(config.auto_capture)
        .bind(config.payment_timeout)
        .bind(config.retry_attempts)
        .bind(config.created_at)
        .bind(config.updated_at)
        .bind(config.activated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                config.id = row.get("id");
                Ok(config)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(PaymentError::Conflict(
                format!("store {} already has gateway {}", config.store_id, config.gateway_name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_gateway(&self, config: &GatewayConfig) -> PaymentResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE payment_gateways SET
                gateway_type = $3, display_name = $4, display_logo = $5, display_description = $6,
                is_active = $7, is_test_mode = $8, priority = $9, api_key = $10, api_secret = $11,
                webhook_secret = $12, merchant_id = $13, settings = $14, supported_currencies = $15,
                min_amount = $16, max_amount = $17, fee_type = $18, fee_rate = $19, fixed_fee = $20,
                supports_refunds = $21, supports_partial_refunds = $22, supports_recurring = $23,
                supports_preauth = $24, auto_capture = $25, payment_timeout = $26,
                retry_attempts = $27, updated_at = $28, activated_at = $29
            WHERE store_id = $1 AND gateway_name = $2
            "#,
        )
        .bind(&config.store_id)
        .bind(config.gateway_name.as_str())
        .bind(config.gateway_type.as_str())
        .bind(&config.display_name)
        .bind(&config.display_logo)
        .bind(&config.display_description)
        .bind(config.is_active)
        .bind(config.is_test_mode)
        .bind(config.priority)
        .bind(&config.credentials.api_key)
        .bind(&config.credentials.api_secret)
        .bind(&config.credentials.webhook_secret)
        .bind(&config.credentials.merchant_id)
        .bind(&config.settings)
        .bind(&config.supported_currencies)
        .bind(config.min_amount)
        .bind(config.max_amount)
        .bind(config.fee_type.as_str())
        .bind(config.fee_rate)
        .bind(config.fixed_fee)
        .bind(config.supports_refunds)
        .bind(config.supports_partial_refunds)
        .bind(config.supports_recurring)
        .bind(config.supports_preauth)
        .bind(config.auto_capture)
        .bind(config.payment_timeout)
        .bind(config.retry_attempts)
        .bind(config.updated_at)
        .bind(config.activated_at)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(PaymentError::GatewayNotFound {
                gateway: config.gateway_name.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<bool> {
        let done = sqlx::query("DELETE FROM payment_gateways WHERE store_id = $1 AND gateway_name = $2")
            .bind(store_id)
            .bind(gateway_name.as_str())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> PaymentResult<bool> {
        let succeeded = matches!(attempt.outcome, AttemptOutcome::Succeeded { .. });
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE payment_gateways SET
                total_transactions = total_transactions + 1,
                failed_transactions = failed_transactions + $3,
                total_amount_processed = total_amount_processed + $4,
                last_transaction_at = $5,
                updated_at = $5
            WHERE store_id = $1 AND gateway_name = $2
            RETURNING id
            "#,
        )
        .bind(&attempt.store_id)
        .bind(attempt.gateway_name.as_str())
        .bind(if succeeded { 0_i64 } else { 1_i64 })
        .bind(if succeeded { attempt.amount } else { Decimal::ZERO })
        .bind(attempt.at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(PaymentError::GatewayNotFound {
                gateway: attempt.gateway_name.to_string(),
            });
        };
        let gateway_id: i64 = row.get("id");

        let AttemptOutcome::Succeeded { payment_reference, is_test_mode } = &attempt.outcome else {
            tx.commit().await?;
            return Ok(false);
        };

        sqlx::query(
            r#"
            INSERT INTO gateway_currency_totals (gateway_id, currency, amount_processed)
            VALUES ($1, $2, $3)
            ON CONFLICT (gateway_id, currency)
            DO UPDATE SET amount_processed = gateway_currency_totals.amount_processed + EXCLUDED.amount_processed
            "#,
        )
        .bind(gateway_id)
        .bind(attempt.currency.to_uppercase())
        .bind(attempt.amount)
        .execute(&mut *tx)
        .await?;

        let moved = sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = 'awaiting_confirmation',
                payment_gateway = $3,
                payment_reference = $4,
                payment_test_mode = $5,
                payment_failure_reason = NULL,
                updated_at = $6
            WHERE store_id = $1 AND id = $2 AND payment_status IN ('pending', 'awaiting_confirmation')
            "#,
        )
        .bind(&attempt.store_id)
        .bind(attempt.order_id)
        .bind(attempt.gateway_name.as_str())
        .bind(payment_reference)
        .bind(*is_test_mode)
        .bind(attempt.at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        tx.commit().await?;
        Ok(moved)
    }

    async fn transition_order(&self, transition: &OrderTransition) -> PaymentResult<bool> {
        let from: Vec<String> = transition.from.iter().map(|s| s.as_str().to_string()).collect();
        let done = sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = $3,
                payment_transaction_id = COALESCE($4, payment_transaction_id),
                payment_failure_reason = COALESCE($5, payment_failure_reason),
                confirmed_at = CASE WHEN $3 = 'paid' THEN $6 ELSE confirmed_at END,
                updated_at = $6
            WHERE store_id = $1 AND id = $2 AND payment_status = ANY($7)
            "#,
        )
        .bind(&transition.store_id)
        .bind(transition.order_id)
        .bind(transition.to.as_str())
        .bind(&transition.transaction_id)
        .bind(&transition.failure_reason)
        .bind(transition.at)
        .bind(&from)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn record_refund(&self, refund: &RefundRecord) -> PaymentResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE orders SET
                refund_amount = refund_amount + $3,
                payment_status = $4,
                refund_reason = $5,
                refunded_at = $6,
                updated_at = $6
            WHERE store_id = $1 AND id = $2 AND refund_amount = $7
              AND payment_status IN ('paid', 'partially_refunded')
            "#,
        )
        .bind(&refund.store_id)
        .bind(refund.order_id)
        .bind(refund.amount)
        .bind(refund.new_status.as_str())
        .bind(&refund.reason)
        .bind(refund.at)
        .bind(refund.expected_refunded)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }
}
