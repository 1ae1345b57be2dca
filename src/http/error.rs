use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use crate::error::{ErrorKind, PaymentError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// `PaymentError` as it leaves the HTTP layer.
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Inactive
        | ErrorKind::OutOfRange
        | ErrorKind::Unsupported
        | ErrorKind::InvalidAmount
        | ErrorKind::InvalidRefundAmount
        | ErrorKind::InvalidConfig => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidSignature => StatusCode::UNAUTHORIZED,
        ErrorKind::ExternalProviderError => StatusCode::BAD_GATEWAY,
        ErrorKind::TransientNetworkError => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        // Storage failures may carry connection details.
        let message = if kind == ErrorKind::Internal {
            tracing::error!("internal error: {:#}", self.0);
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let details = if self.0.is_retryable() {
            Some("retry with the same request".to_string())
        } else {
            None
        };
        (
            status_for(kind),
            Json(ErrorEnvelope {
                error: ErrorPayload {
                    code: self.0.code().to_string(),
                    message,
                    details,
                },
            }),
        )
            .into_response()
    }
}
