use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use storefront_payments::domain::gateway::{FeeType, GatewayConfig, GatewayName, GatewayType};
use storefront_payments::domain::order::{Order, PaymentState, ReferenceKey};
use storefront_payments::error::{ErrorKind, PaymentError, PaymentResult};
use storefront_payments::gateways::cod::CashOnDelivery;
use storefront_payments::gateways::mock::MockGateway;
use storefront_payments::gateways::AdapterRegistry;
use storefront_payments::repo::memory_store::MemoryPaymentStore;
use storefront_payments::repo::store::{AttemptRecord, OrderTransition, PaymentStore, RefundRecord};
use storefront_payments::service::orchestrator::PaymentOrchestrator;

const STORE: &str = "store-1";

fn razorpay_config(active: bool) -> GatewayConfig {
    let now = Utc::now();
    let mut gw = GatewayConfig::new(STORE, GatewayName::Razorpay, GatewayType::Online, "Razorpay", now);
    gw.supported_currencies = vec!["INR".to_string()];
    gw.min_amount = dec!(1.00);
    gw.priority = 4;
    if active {
        gw.activate(now);
    }
    gw
}

async fn setup(gateway: GatewayConfig, mock: MockGateway) -> (Arc<MemoryPaymentStore>, PaymentOrchestrator) {
    let store = Arc::new(MemoryPaymentStore::new());
    store.insert_gateway(gateway).await.unwrap();
    store
        .put_order(Order::new(STORE, 1, "ORD-1", dec!(500.00), "INR"))
        .await;
    let adapters = AdapterRegistry::new()
        .register(Arc::new(mock))
        .register(Arc::new(CashOnDelivery));
    let orchestrator = PaymentOrchestrator::new(store.clone(), adapters, Duration::from_secs(5));
    (store, orchestrator)
}

async fn paid_order(store: &MemoryPaymentStore) {
    let mut order = Order::new(STORE, 2, "ORD-2", dec!(500.00), "INR");
    order.payment_status = PaymentState::Paid;
    order.payment_gateway = Some(GatewayName::Razorpay);
    order.payment_reference = Some("mock_ORD-2".to_string());
    order.payment_test_mode = Some(true);
    store.put_order(order).await;
}

#[tokio::test]
async fn create_payment_order_updates_order_and_stats() {
    let (store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS"),
    )
    .await;

    let resp = orch
        .create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap();
    assert_eq!(resp.intent.payment_id, "mock_ORD-1");
    assert_eq!(resp.payment_status, PaymentState::AwaitingConfirmation);

    let order = store.get_order(STORE, 1).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::AwaitingConfirmation);
    assert_eq!(order.payment_reference.as_deref(), Some("mock_ORD-1"));
    assert_eq!(order.payment_gateway, Some(GatewayName::Razorpay));

    let gw = store.get_gateway(STORE, &GatewayName::Razorpay).await.unwrap().unwrap();
    assert_eq!(gw.stats.total_transactions, 1);
    assert_eq!(gw.stats.failed_transactions, 0);
    assert_eq!(gw.stats.total_amount_processed, dec!(500.00));
    assert_eq!(gw.stats.processed_by_currency.get("INR"), Some(&dec!(500.00)));
}

#[tokio::test]
async fn inactive_gateway_is_rejected_without_touching_stats() {
    let mock = MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS");
    let (store, orch) = setup(razorpay_config(false), mock).await;

    let err = orch
        .create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Inactive);

    let gw = store.get_gateway(STORE, &GatewayName::Razorpay).await.unwrap().unwrap();
    assert_eq!(gw.stats.total_transactions, 0);
    let order = store.get_order(STORE, 1).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::Pending);
}

#[tokio::test]
async fn ineligible_amount_and_currency_name_the_bounds() {
    let mut gw = razorpay_config(true);
    gw.max_amount = Some(dec!(100.00));
    let (store, orch) = setup(gw, MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS")).await;

    let err = orch
        .create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
    assert!(err.to_string().contains("Max: 100.00"));

    store
        .put_order(Order::new(STORE, 3, "ORD-3", dec!(50.00), "USD"))
        .await;
    let err = orch
        .create_payment_order(STORE, 3, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CURRENCY_NOT_SUPPORTED");
    assert!(err.to_string().contains("INR"));
}

#[tokio::test]
async fn missing_order_and_gateway_are_not_found() {
    let (_store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS"),
    )
    .await;

    let err = orch
        .create_payment_order(STORE, 99, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ORDER_NOT_FOUND");

    let err = orch
        .create_payment_order(STORE, 1, &GatewayName::Paypal)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GATEWAY_NOT_AVAILABLE");
}

#[tokio::test]
async fn provider_failure_counts_a_failed_transaction() {
    let (store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_FAILURE"),
    )
    .await;

    let err = orch
        .create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalProviderError);
    assert!(!err.is_retryable());

    let gw = store.get_gateway(STORE, &GatewayName::Razorpay).await.unwrap().unwrap();
    assert_eq!(gw.stats.total_transactions, 1);
    assert_eq!(gw.stats.failed_transactions, 1);
    assert_eq!(gw.stats.total_amount_processed, Decimal::ZERO);
    let order = store.get_order(STORE, 1).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::Pending);
}

#[tokio::test]
async fn paid_order_cannot_start_another_payment() {
    let (store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS"),
    )
    .await;
    paid_order(&store).await;

    let err = orch
        .create_payment_order(STORE, 2, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn verify_marks_order_paid_once_amount_matches() {
    let mock = MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS").with_capture(dec!(500.00), "INR");
    let (store, orch) = setup(razorpay_config(true), mock).await;
    orch.create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap();

    let resp = orch
        .verify_payment(STORE, &GatewayName::Razorpay, "mock_ORD-1", None)
        .await
        .unwrap();
    assert_eq!(resp.order_id, Some(1));
    assert_eq!(resp.payment_status, Some(PaymentState::Paid));

    let order = store.get_order(STORE, 1).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::Paid);
    assert_eq!(order.payment_transaction_id.as_deref(), Some("mock_txn_mock_ORD-1"));
    assert!(order.confirmed_at.is_some());

    // Verification leaves attempt statistics alone.
    let gw = store.get_gateway(STORE, &GatewayName::Razorpay).await.unwrap().unwrap();
    assert_eq!(gw.stats.total_transactions, 1);
}

#[tokio::test]
async fn verify_rejects_captured_amount_mismatch() {
    let mock = MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS").with_capture(dec!(5.00), "INR");
    let (store, orch) = setup(razorpay_config(true), mock).await;
    orch.create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap();

    let err = orch
        .verify_payment(STORE, &GatewayName::Razorpay, "mock_ORD-1", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalProviderError);
    let order = store.get_order(STORE, 1).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::AwaitingConfirmation);
}

#[tokio::test]
async fn full_refund_closes_the_order() {
    let (store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS"),
    )
    .await;
    paid_order(&store).await;

    let resp = orch
        .process_refund(STORE, 2, dec!(500.00), Some("damaged"), None)
        .await
        .unwrap();
    assert_eq!(resp.payment_status, PaymentState::Refunded);
    assert_eq!(resp.refund_amount, dec!(500.00));

    let err = orch
        .process_refund(STORE, 2, dec!(0.01), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRefundAmount);
}

#[tokio::test]
async fn partial_refunds_accumulate_to_refunded() {
    let (store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS"),
    )
    .await;
    paid_order(&store).await;

    let first = orch
        .process_refund(STORE, 2, dec!(200.00), None, None)
        .await
        .unwrap();
    assert_eq!(first.payment_status, PaymentState::PartiallyRefunded);
    assert_eq!(first.refund_amount, dec!(200.00));

    let second = orch
        .process_refund(STORE, 2, dec!(300.00), None, None)
        .await
        .unwrap();
    assert_eq!(second.payment_status, PaymentState::Refunded);

    let order = store.get_order(STORE, 2).await.unwrap().unwrap();
    assert_eq!(order.refund_amount, dec!(500.00));
    assert_eq!(order.payment_status, PaymentState::Refunded);
}

#[tokio::test]
async fn refund_respects_gateway_capabilities() {
    let mut gw = razorpay_config(true);
    gw.supports_partial_refunds = false;
    let (store, orch) = setup(gw, MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS")).await;
    paid_order(&store).await;

    let err = orch
        .process_refund(STORE, 2, dec!(100.00), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    let err = orch
        .process_refund(STORE, 2, dec!(-1), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRefundAmount);

    // Unpaid orders cannot be refunded.
    let err = orch
        .process_refund(STORE, 1, dec!(100.00), None, Some(&GatewayName::Razorpay))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn payment_methods_carry_fees_in_priority_order() {
    let mut razorpay = razorpay_config(true);
    razorpay.fee_type = FeeType::Mixed;
    razorpay.fee_rate = dec!(0.029);
    razorpay.fixed_fee = dec!(2.00);
    let (store, orch) = setup(razorpay, MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS")).await;

    let now = Utc::now();
    let mut cod = GatewayConfig::new(STORE, GatewayName::Cod, GatewayType::Offline, "Cash on Delivery", now);
    cod.supported_currencies = vec!["INR".to_string()];
    cod.priority = 1;
    cod.activate(now);
    store.insert_gateway(cod).await.unwrap();
    let mut paypal = GatewayConfig::new(STORE, GatewayName::Paypal, GatewayType::Online, "PayPal", now);
    paypal.priority = 9;
    store.insert_gateway(paypal).await.unwrap();

    let methods = orch
        .get_payment_methods(STORE, Some(dec!(100.00)), "INR")
        .await
        .unwrap();
    let names: Vec<GatewayName> = methods.iter().map(|m| m.gateway_name.clone()).collect();
    assert_eq!(names, vec![GatewayName::Razorpay, GatewayName::Cod]);
    assert_eq!(methods[0].transaction_fees, dec!(4.90));
    assert_eq!(methods[1].transaction_fees, Decimal::ZERO);

    let json = serde_json::to_value(&methods).unwrap();
    assert!(json[0].get("credentials").is_none());
}

#[tokio::test]
async fn timeouts_surface_as_retryable() {
    let (store, orch) = setup(
        razorpay_config(true),
        MockGateway::new(GatewayName::Razorpay, "ALWAYS_TIMEOUT"),
    )
    .await;

    let err = orch
        .create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    let gw = store.get_gateway(STORE, &GatewayName::Razorpay).await.unwrap().unwrap();
    assert_eq!(gw.stats.failed_transactions, 1);
}

#[tokio::test]
async fn cash_on_delivery_creates_offline_payment() {
    let now = Utc::now();
    let mut cod = GatewayConfig::new(STORE, GatewayName::Cod, GatewayType::Offline, "Cash on Delivery", now);
    cod.supported_currencies = vec!["INR".to_string()];
    cod.activate(now);
    let (store, orch) = setup(razorpay_config(true), MockGateway::new(GatewayName::Razorpay, "ALWAYS_SUCCESS")).await;
    store.insert_gateway(cod).await.unwrap();

    let resp = orch
        .create_payment_order(STORE, 1, &GatewayName::Cod)
        .await
        .unwrap();
    assert_eq!(resp.intent.payment_id, "cod_ORD-1");
}

/// Delegates to the memory store but cannot write attempt stats.
struct StatsDownStore(Arc<MemoryPaymentStore>);

#[async_trait::async_trait]
impl PaymentStore for StatsDownStore {
    async fn get_order(&self, store_id: &str, order_id: i64) -> PaymentResult<Option<Order>> {
        self.0.get_order(store_id, order_id).await
    }
    async fn find_order_by_reference(&self, key: &ReferenceKey) -> PaymentResult<Option<Order>> {
        self.0.find_order_by_reference(key).await
    }
    async fn get_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<Option<GatewayConfig>> {
        self.0.get_gateway(store_id, gateway_name).await
    }
    async fn list_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        self.0.list_gateways(store_id).await
    }
    async fn list_active_gateways(&self, store_id: &str) -> PaymentResult<Vec<GatewayConfig>> {
        self.0.list_active_gateways(store_id).await
    }
    async fn insert_gateway(&self, config: GatewayConfig) -> PaymentResult<GatewayConfig> {
        self.0.insert_gateway(config).await
    }
    async fn save_gateway(&self, config: &GatewayConfig) -> PaymentResult<()> {
        self.0.save_gateway(config).await
    }
    async fn delete_gateway(&self, store_id: &str, gateway_name: &GatewayName) -> PaymentResult<bool> {
        self.0.delete_gateway(store_id, gateway_name).await
    }
    async fn record_attempt(&self, _attempt: &AttemptRecord) -> PaymentResult<bool> {
        Err(PaymentError::Internal(anyhow::anyhow!("connection reset")))
    }
    async fn transition_order(&self, transition: &OrderTransition) -> PaymentResult<bool> {
        self.0.transition_order(transition).await
    }
    async fn record_refund(&self, refund: &RefundRecord) -> PaymentResult<bool> {
        self.0.record_refund(refund).await
    }
}

#[tokio::test]
async fn provider_error_survives_lost_attempt_stats() {
    let memory = Arc::new(MemoryPaymentStore::new());
    memory.insert_gateway(razorpay_config(true)).await.unwrap();
    memory
        .put_order(Order::new(STORE, 1, "ORD-1", dec!(500.00), "INR"))
        .await;
    let adapters = AdapterRegistry::new().register(Arc::new(MockGateway::new(GatewayName::Razorpay, "ALWAYS_FAILURE")));
    let orch = PaymentOrchestrator::new(
        Arc::new(StatsDownStore(memory.clone())),
        adapters,
        Duration::from_secs(5),
    );

    let err = orch
        .create_payment_order(STORE, 1, &GatewayName::Razorpay)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalProviderError);
    assert!(err.to_string().contains("MOCK_DECLINED"));

    let order = memory.get_order(STORE, 1).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::Pending);
    let gw = memory.get_gateway(STORE, &GatewayName::Razorpay).await.unwrap().unwrap();
    assert_eq!(gw.stats.failed_transactions, 0);
}
