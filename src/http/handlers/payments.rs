use crate::domain::gateway::GatewayName;
use crate::http::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PaymentMethodsQuery {
    pub amount: Option<Decimal>,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ActiveGatewaysQuery {
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub gateway_name: GatewayName,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub payment_id: String,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub amount: Decimal,
    pub reason: Option<String>,
    pub gateway_name: Option<GatewayName>,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn payment_methods(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(q): Query<PaymentMethodsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let methods = state
        .orchestrator
        .get_payment_methods(&store_id, q.amount, &q.currency)
        .await?;
    Ok((StatusCode::OK, Json(methods)))
}

pub async fn active_gateways(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(q): Query<ActiveGatewaysQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let gateways = state
        .orchestrator
        .list_active_gateways(&store_id, q.currency.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(gateways)))
}

pub async fn create_payment(
    State(state): State<AppState>,
    Path((store_id, order_id)): Path<(String, i64)>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .orchestrator
        .create_payment_order(&store_id, order_id, &req.gateway_name)
        .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Path((store_id, gateway_name)): Path<(String, String)>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .orchestrator
        .verify_payment(
            &store_id,
            &GatewayName::from(gateway_name),
            &req.payment_id,
            req.payload.as_ref(),
        )
        .await?;
    Ok((StatusCode::OK, Json(resp)))
}

pub async fn refund(
    State(state): State<AppState>,
    Path((store_id, order_id)): Path<(String, i64)>,
    Json(req): Json<RefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .orchestrator
        .process_refund(
            &store_id,
            order_id,
            req.amount,
            req.reason.as_deref(),
            req.gateway_name.as_ref(),
        )
        .await?;
    Ok((StatusCode::OK, Json(resp)))
}
