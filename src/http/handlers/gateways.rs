use crate::domain::gateway::GatewayName;
use crate::http::error::ApiError;
use crate::service::gateway_admin::{GatewayPatch, NewGateway};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub reveal_secrets: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub gateway_names: Vec<GatewayName>,
}

pub async fn list_gateways(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.gateway_admin.list(&store_id, q.reveal_secrets).await?;
    Ok((StatusCode::OK, Json(items)))
}

pub async fn create_gateway(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Json(req): Json<NewGateway>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.gateway_admin.create(&store_id, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn create_defaults(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.gateway_admin.create_defaults(&store_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_gateway(
    State(state): State<AppState>,
    Path((store_id, gateway_name)): Path<(String, String)>,
    Json(patch): Json<GatewayPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .gateway_admin
        .update(&store_id, &GatewayName::from(gateway_name), patch)
        .await?;
    Ok((StatusCode::OK, Json(updated)))
}

pub async fn toggle_gateway(
    State(state): State<AppState>,
    Path((store_id, gateway_name)): Path<(String, String)>,
    Json(req): Json<ToggleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .gateway_admin
        .set_active(&store_id, &GatewayName::from(gateway_name), req.is_active)
        .await?;
    Ok((StatusCode::OK, Json(updated)))
}

pub async fn reorder_gateways(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.gateway_admin.reorder(&store_id, &req.gateway_names).await?;
    Ok((StatusCode::OK, Json(items)))
}

pub async fn delete_gateway(
    State(state): State<AppState>,
    Path((store_id, gateway_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .gateway_admin
        .delete(&store_id, &GatewayName::from(gateway_name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
