use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use crate::gateways::signing::constant_time_eq;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const API_KEY_HEADER: &str = "X-Internal-Api-Key";

pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if !constant_time_eq(&expected, provided) {
        tracing::warn!("rejected admin request to {}", request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorEnvelope {
                error: ErrorPayload {
                    code: "UNAUTHORIZED".to_string(),
                    message: format!("missing or invalid {}", API_KEY_HEADER),
                    details: None,
                },
            }),
        )
            .into_response();
    }

    next.run(request).await
}
