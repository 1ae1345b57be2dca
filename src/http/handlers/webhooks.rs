use crate::domain::gateway::GatewayName;
use crate::domain::payment::WebhookEvent;
use crate::http::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

/// Body is taken as raw text so signatures are checked over the exact bytes
/// the provider sent.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path((store_id, gateway_name)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let mut event = WebhookEvent::new(body);
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            event = event.with_header(name.as_str(), v);
        }
    }

    let outcome = state
        .webhook_router
        .handle_webhook(&store_id, &GatewayName::from(gateway_name), &event)
        .await?;
    Ok((StatusCode::OK, Json(outcome)))
}
