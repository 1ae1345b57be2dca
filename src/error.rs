use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Inactive,
    OutOfRange,
    Unsupported,
    ExternalProviderError,
    InvalidSignature,
    InvalidRefundAmount,
    TransientNetworkError,
    InvalidAmount,
    InvalidState,
    InvalidConfig,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: i64 },

    #[error("payment gateway {gateway} not found")]
    GatewayNotFound { gateway: String },

    #[error("payment gateway {gateway} is not active")]
    GatewayInactive { gateway: String },

    #[error("amount {amount} not supported. Min: {min}, Max: {}", .max.map(|m| m.to_string()).unwrap_or_else(|| "none".to_string()))]
    AmountNotSupported {
        amount: Decimal,
        min: Decimal,
        max: Option<Decimal>,
    },

    #[error("currency {currency} not supported. Supported: {}", .supported.join(", "))]
    CurrencyNotSupported {
        currency: String,
        supported: Vec<String>,
    },

    #[error("unsupported payment gateway {0}")]
    UnsupportedGateway(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{gateway} refused the request: {message}")]
    Provider { gateway: String, message: String },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid refund amount: {0}")]
    InvalidRefundAmount(String),

    #[error("{gateway} unreachable: {message}")]
    Transient { gateway: String, message: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("invalid gateway configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::OrderNotFound { .. } | PaymentError::GatewayNotFound { .. } => {
                ErrorKind::NotFound
            }
            PaymentError::GatewayInactive { .. } => ErrorKind::Inactive,
            PaymentError::AmountNotSupported { .. } | PaymentError::CurrencyNotSupported { .. } => {
                ErrorKind::OutOfRange
            }
            PaymentError::UnsupportedGateway(_) | PaymentError::Unsupported(_) => {
                ErrorKind::Unsupported
            }
            PaymentError::Provider { .. } => ErrorKind::ExternalProviderError,
            PaymentError::InvalidSignature(_) => ErrorKind::InvalidSignature,
            PaymentError::InvalidRefundAmount(_) => ErrorKind::InvalidRefundAmount,
            PaymentError::Transient { .. } => ErrorKind::TransientNetworkError,
            PaymentError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            PaymentError::InvalidState(_) => ErrorKind::InvalidState,
            PaymentError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            PaymentError::Conflict(_) => ErrorKind::Conflict,
            PaymentError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            PaymentError::GatewayNotFound { .. } | PaymentError::GatewayInactive { .. } => {
                "GATEWAY_NOT_AVAILABLE"
            }
            PaymentError::AmountNotSupported { .. } => "AMOUNT_NOT_SUPPORTED",
            PaymentError::CurrencyNotSupported { .. } => "CURRENCY_NOT_SUPPORTED",
            PaymentError::UnsupportedGateway(_) => "UNSUPPORTED_GATEWAY",
            PaymentError::Unsupported(_) => "CAPABILITY_NOT_SUPPORTED",
            PaymentError::Provider { .. } => "PROVIDER_ERROR",
            PaymentError::InvalidSignature(_) => "INVALID_SIGNATURE",
            PaymentError::InvalidRefundAmount(_) => "INVALID_REFUND_AMOUNT",
            PaymentError::Transient { .. } => "PROVIDER_UNREACHABLE",
            PaymentError::InvalidAmount(_) => "INVALID_AMOUNT",
            PaymentError::InvalidState(_) => "PAYMENT_STATE_CONFLICT",
            PaymentError::InvalidConfig(_) => "INVALID_GATEWAY_CONFIG",
            PaymentError::Conflict(_) => "CONFLICT",
            PaymentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Only transport-level failures are worth retrying, and only with the
    /// same idempotency key.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientNetworkError
    }

    pub fn provider(gateway: impl ToString, message: impl Into<String>) -> Self {
        PaymentError::Provider {
            gateway: gateway.to_string(),
            message: message.into(),
        }
    }

    pub fn transient(gateway: impl ToString, message: impl Into<String>) -> Self {
        PaymentError::Transient {
            gateway: gateway.to_string(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Internal(anyhow::Error::from(e))
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_message_includes_bounds() {
        let err = PaymentError::AmountNotSupported {
            amount: Decimal::new(50, 2),
            min: Decimal::ONE,
            max: None,
        };
        assert_eq!(err.to_string(), "amount 0.50 not supported. Min: 1, Max: none");
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(PaymentError::transient("razorpay", "timed out").is_retryable());
        assert!(!PaymentError::provider("razorpay", "HTTP 400").is_retryable());
        assert!(!PaymentError::InvalidSignature("mismatch".into()).is_retryable());
    }
}
