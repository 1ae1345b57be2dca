use crate::http::handlers::{gateways, payments, webhooks};
use crate::http::middleware::admin_auth;
use crate::AppState;
use axum::extract::Request;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put, Route};
use axum::Router;
use std::convert::Infallible;
use tower::{Layer, Service};

fn admin_routes(internal_api_key: String) -> Router<AppState> {
    Router::new()
        .route(
            "/admin/stores/:store_id/gateways",
            get(gateways::list_gateways).post(gateways::create_gateway),
        )
        .route(
            "/admin/stores/:store_id/gateways/defaults",
            post(gateways::create_defaults),
        )
        .route(
            "/admin/stores/:store_id/gateways/order",
            put(gateways::reorder_gateways),
        )
        .route(
            "/admin/stores/:store_id/gateways/:gateway_name",
            patch(gateways::update_gateway).delete(gateways::delete_gateway),
        )
        .route(
            "/admin/stores/:store_id/gateways/:gateway_name/active",
            put(gateways::toggle_gateway),
        )
        .layer(from_fn_with_state(
            internal_api_key,
            admin_auth::require_internal_api_key,
        ))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(payments::health))
        .route("/stores/:store_id/payment-methods", get(payments::payment_methods))
        .route("/stores/:store_id/gateways/active", get(payments::active_gateways))
        .route(
            "/stores/:store_id/orders/:order_id/payments",
            post(payments::create_payment),
        )
        .route(
            "/stores/:store_id/payments/:gateway_name/verify",
            post(payments::verify_payment),
        )
        .route(
            "/stores/:store_id/orders/:order_id/refunds",
            post(payments::refund),
        )
}

/// Provider callbacks come from a handful of provider ips in bursts of
/// retries, so they sit outside the per-ip limiter.
fn webhook_routes() -> Router<AppState> {
    Router::new().route(
        "/stores/:store_id/webhooks/:gateway_name",
        post(webhooks::receive_webhook),
    )
}

/// Full HTTP surface. `rate_limit` wraps the public and admin routes only.
pub fn router<L>(state: AppState, internal_api_key: String, rate_limit: L) -> Router
where
    L: Layer<Route> + Clone + Send + 'static,
    L::Service: Service<Request> + Clone + Send + 'static,
    <L::Service as Service<Request>>::Response: IntoResponse + 'static,
    <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    public_routes()
        .merge(admin_routes(internal_api_key))
        .layer(rate_limit)
        .merge(webhook_routes())
        .with_state(state)
}
