use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Fixed one-minute window per client ip. Redis being down lets traffic
/// through.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = format!(
        "payments:rate:{}:{}",
        client_ip(request.headers()),
        chrono::Utc::now().format("%Y%m%d%H%M")
    );

    match state.redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
            if count == 1 {
                let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
            }
            if count > state.max_per_minute {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorEnvelope {
                        error: ErrorPayload {
                            code: "RATE_LIMITED".to_string(),
                            message: "rate limit exceeded".to_string(),
                            details: Some(format!("{} requests per minute", state.max_per_minute)),
                        },
                    }),
                )
                    .into_response();
            }
        }
        Err(e) => tracing::warn!("rate limiter unavailable: {}", e),
    }

    next.run(request).await
}
