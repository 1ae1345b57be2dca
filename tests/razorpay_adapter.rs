use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use storefront_payments::domain::gateway::{GatewayConfig, GatewayName, GatewayType};
use storefront_payments::domain::order::{Order, PaymentState};
use storefront_payments::domain::payment::ProviderStatus;
use storefront_payments::error::ErrorKind;
use storefront_payments::gateways::razorpay::RazorpayGateway;
use storefront_payments::gateways::signing::hmac_sha256_hex;
use storefront_payments::gateways::GatewayAdapter;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> GatewayConfig {
    let now = Utc::now();
    let mut gw = GatewayConfig::new("s1", GatewayName::Razorpay, GatewayType::Online, "Acme Store", now);
    gw.supported_currencies = vec!["INR".to_string()];
    gw.credentials.api_key = Some("rzp_test_key".to_string());
    gw.credentials.api_secret = Some("rzp_secret".to_string());
    gw.activate(now);
    gw
}

fn adapter(server: &MockServer) -> RazorpayGateway {
    RazorpayGateway {
        base_url: server.uri(),
        call_cap: Duration::from_secs(5),
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn create_order_sends_paise_and_order_number_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "amount": 50000,
            "currency": "INR",
            "receipt": "ORD-1",
            "payment_capture": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_rzp_1",
            "amount": 50000,
            "currency": "INR",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = Order::new("s1", 1, "ORD-1", dec!(500.00), "INR");
    let intent = adapter(&server).create_order(&config(), &order).await.unwrap();
    assert_eq!(intent.payment_id, "order_rzp_1");
    assert_eq!(intent.checkout["key_id"], "rzp_test_key");
    assert_eq!(intent.checkout["amount"], 50000);
}

#[tokio::test]
async fn fractional_paise_never_reach_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let order = Order::new("s1", 1, "ORD-1", dec!(10.005), "INR");
    let err = adapter(&server).create_order(&config(), &order).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAmount);
}

#[tokio::test]
async fn provider_rejection_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": "BAD_REQUEST_ERROR", "description": "amount too low" }
        })))
        .mount(&server)
        .await;

    let order = Order::new("s1", 1, "ORD-1", dec!(500.00), "INR");
    let err = adapter(&server).create_order(&config(), &order).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalProviderError);
    assert!(err.to_string().contains("HTTP_400"));
}

#[tokio::test]
async fn verify_checks_checkout_signature_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/pay_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pay_1",
            "order_id": "order_rzp_1",
            "amount": 50000,
            "currency": "INR",
            "status": "captured",
            "captured": true,
            "method": "upi"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = adapter(&server);
    let forged = json!({
        "razorpay_order_id": "order_rzp_1",
        "razorpay_payment_id": "pay_1",
        "razorpay_signature": "00"
    });
    let err = gw.verify_payment(&config(), "pay_1", Some(&forged)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);

    let signed = json!({
        "razorpay_order_id": "order_rzp_1",
        "razorpay_payment_id": "pay_1",
        "razorpay_signature": hmac_sha256_hex("rzp_secret", b"order_rzp_1|pay_1")
    });
    let status = gw.verify_payment(&config(), "pay_1", Some(&signed)).await.unwrap();
    assert_eq!(status.status, ProviderStatus::Captured);
    assert_eq!(status.amount, dec!(500.00));
    assert_eq!(status.order_reference.as_deref(), Some("order_rzp_1"));
    assert!(status.captured);
}

#[tokio::test]
async fn unsigned_checkout_fields_are_rejected_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/pay_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "pay_1" })))
        .expect(0)
        .mount(&server)
        .await;

    let gw = adapter(&server);
    let unsigned = json!({ "razorpay_order_id": "order_rzp_1", "razorpay_payment_id": "pay_1" });
    let err = gw.verify_payment(&config(), "pay_1", Some(&unsigned)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    assert!(err.to_string().contains("razorpay_signature"));

    let only_order = json!({ "razorpay_order_id": "order_rzp_1" });
    let err = gw.verify_payment(&config(), "pay_1", Some(&only_order)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);
}

#[tokio::test]
async fn refund_uses_cumulative_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/pay_1/refund"))
        .and(body_partial_json(json!({ "amount": 30000, "receipt": "ORD-1-R500" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rfnd_1",
            "amount": 30000,
            "status": "processed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut order = Order::new("s1", 1, "ORD-1", dec!(500.00), "INR");
    order.payment_status = PaymentState::PartiallyRefunded;
    order.payment_transaction_id = Some("pay_1".to_string());
    order.refund_amount = dec!(200.00);

    let refund = adapter(&server)
        .process_refund(&config(), &order, dec!(300.00), None)
        .await
        .unwrap();
    assert_eq!(refund.refund_id, "rfnd_1");
    assert_eq!(refund.amount, dec!(300.00));
}

#[tokio::test]
async fn slow_provider_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "order_late" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let gw = RazorpayGateway {
        base_url: server.uri(),
        call_cap: Duration::from_millis(50),
        client: reqwest::Client::new(),
    };
    let order = Order::new("s1", 1, "ORD-1", dec!(500.00), "INR");
    let err = gw.create_order(&config(), &order).await.unwrap_err();
    assert!(err.is_retryable());
}
