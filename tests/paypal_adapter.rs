use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use storefront_payments::domain::gateway::{GatewayConfig, GatewayName, GatewayType};
use storefront_payments::domain::order::{Order, PaymentState};
use storefront_payments::domain::payment::ProviderStatus;
use storefront_payments::gateways::paypal::PaypalGateway;
use storefront_payments::gateways::{AdapterRegistry, GatewayAdapter};
use storefront_payments::repo::memory_store::MemoryPaymentStore;
use storefront_payments::repo::store::PaymentStore;
use storefront_payments::service::orchestrator::PaymentOrchestrator;
use wiremock::matchers::{body_partial_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> GatewayConfig {
    let now = Utc::now();
    let mut gw = GatewayConfig::new("s1", GatewayName::Paypal, GatewayType::Online, "Acme Store", now);
    gw.supported_currencies = vec!["USD".to_string()];
    gw.credentials.api_key = Some("client-id".to_string());
    gw.credentials.api_secret = Some("client-secret".to_string());
    gw.activate(now);
    gw
}

/// Sandbox points at the mock server; live points nowhere, so a request
/// leaking to it fails loudly.
fn adapter(server: &MockServer) -> PaypalGateway {
    PaypalGateway {
        live_url: "http://127.0.0.1:9".to_string(),
        sandbox_url: server.uri(),
        public_base_url: "https://shop.example.com".to_string(),
        call_cap: Duration::from_secs(5),
        client: reqwest::Client::new(),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(body_string("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A21AA-token",
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_order_fetches_token_then_posts_decimal_amount() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header("authorization", "Bearer A21AA-token"))
        .and(header("PayPal-Request-Id", "ORD-9"))
        .and(body_partial_json(json!({
            "intent": "CAPTURE",
            "purchase_units": [{ "amount": { "currency_code": "USD", "value": "49.90" } }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "5O190127TN364715T",
            "status": "CREATED",
            "links": [
                { "rel": "self", "href": "https://api.sandbox.paypal.com/v2/checkout/orders/5O190127TN364715T" },
                { "rel": "approve", "href": "https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = Order::new("s1", 9, "ORD-9", dec!(49.9), "USD");
    let intent = adapter(&server).create_order(&config(), &order).await.unwrap();
    assert_eq!(intent.payment_id, "5O190127TN364715T");
    assert_eq!(
        intent.checkout["approval_url"],
        "https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T"
    );
}

#[tokio::test]
async fn failed_token_exchange_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_client" })))
        .mount(&server)
        .await;

    let order = Order::new("s1", 9, "ORD-9", dec!(49.90), "USD");
    let err = adapter(&server).create_order(&config(), &order).await.unwrap_err();
    assert_eq!(err.code(), "PROVIDER_ERROR");
}

#[tokio::test]
async fn verify_reads_capture_from_completed_order() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/5O190127TN364715T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "ORD-9",
                "amount": { "currency_code": "USD", "value": "49.90" },
                "payments": { "captures": [{ "id": "CAP-1", "status": "COMPLETED" }] }
            }]
        })))
        .mount(&server)
        .await;

    let status = adapter(&server)
        .verify_payment(&config(), "5O190127TN364715T", None)
        .await
        .unwrap();
    assert_eq!(status.status, ProviderStatus::Captured);
    assert_eq!(status.amount, dec!(49.90));
    assert_eq!(status.transaction_id.as_deref(), Some("CAP-1"));
}

#[tokio::test]
async fn refund_through_orchestrator_records_partial_refund() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/payments/captures/CAP-1/refund"))
        .and(header("PayPal-Request-Id", "ORD-9-R10"))
        .and(body_partial_json(json!({ "amount": { "value": "10.00", "currency_code": "USD" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "REF-1",
            "status": "COMPLETED",
            "amount": { "value": "10.00", "currency_code": "USD" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryPaymentStore::new());
    store.insert_gateway(config()).await.unwrap();
    let mut order = Order::new("s1", 9, "ORD-9", dec!(49.90), "USD");
    order.payment_status = PaymentState::Paid;
    order.payment_gateway = Some(GatewayName::Paypal);
    order.payment_transaction_id = Some("CAP-1".to_string());
    store.put_order(order).await;

    let orch = PaymentOrchestrator::new(
        store.clone(),
        AdapterRegistry::new().register(Arc::new(adapter(&server))),
        Duration::from_secs(5),
    );
    let resp = orch
        .process_refund("s1", 9, dec!(10.00), Some("late delivery"), None)
        .await
        .unwrap();
    assert_eq!(resp.refund.refund_id, "REF-1");
    assert_eq!(resp.refund.status, "completed");
    assert_eq!(resp.payment_status, PaymentState::PartiallyRefunded);

    let order = store.get_order("s1", 9).await.unwrap().unwrap();
    assert_eq!(order.refund_amount, dec!(10.00));
    assert_eq!(order.refund_reason.as_deref(), Some("late delivery"));
}

#[tokio::test]
async fn authorize_intent_is_not_reported_as_captured() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/AUTH1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "AUTH1",
            "intent": "AUTHORIZE",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "ORD-9",
                "payments": { "authorizations": [{ "id": "AUTHZ-1", "status": "CREATED" }] }
            }]
        })))
        .mount(&server)
        .await;

    let mut cfg = config();
    cfg.auto_capture = false;
    let store = Arc::new(MemoryPaymentStore::new());
    store.insert_gateway(cfg.clone()).await.unwrap();
    let mut order = Order::new("s1", 9, "ORD-9", dec!(49.90), "USD");
    order.payment_status = PaymentState::AwaitingConfirmation;
    order.payment_gateway = Some(GatewayName::Paypal);
    order.payment_reference = Some("AUTH1".to_string());
    order.payment_test_mode = Some(cfg.is_test_mode);
    store.put_order(order).await;

    let status = adapter(&server).verify_payment(&cfg, "AUTH1", None).await.unwrap();
    assert_eq!(status.status, ProviderStatus::Authorized);
    assert!(!status.captured);
    assert_eq!(status.transaction_id.as_deref(), Some("AUTHZ-1"));

    let orch = PaymentOrchestrator::new(
        store.clone(),
        AdapterRegistry::new().register(Arc::new(adapter(&server))),
        Duration::from_secs(5),
    );
    let resp = orch
        .verify_payment("s1", &GatewayName::Paypal, "AUTH1", None)
        .await
        .unwrap();
    assert_eq!(resp.payment_status, Some(PaymentState::AwaitingConfirmation));
    let order = store.get_order("s1", 9).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentState::AwaitingConfirmation);
}

#[tokio::test]
async fn completed_order_with_pending_capture_is_pending() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/5O190127TN364715T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5O190127TN364715T",
            "intent": "CAPTURE",
            "status": "COMPLETED",
            "purchase_units": [{
                "amount": { "currency_code": "USD", "value": "49.90" },
                "payments": { "captures": [{ "id": "CAP-2", "status": "PENDING" }] }
            }]
        })))
        .mount(&server)
        .await;

    let status = adapter(&server)
        .verify_payment(&config(), "5O190127TN364715T", None)
        .await
        .unwrap();
    assert_eq!(status.status, ProviderStatus::Pending);
    assert!(!status.captured);
}
