use crate::domain::gateway::GatewayName;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    AwaitingConfirmation,
    Paid,
    Failed,
    PartiallyRefunded,
    Refunded,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::AwaitingConfirmation => "awaiting_confirmation",
            PaymentState::Paid => "paid",
            PaymentState::Failed => "failed",
            PaymentState::PartiallyRefunded => "partially_refunded",
            PaymentState::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentState::Pending),
            "awaiting_confirmation" => Some(PaymentState::AwaitingConfirmation),
            "paid" => Some(PaymentState::Paid),
            "failed" => Some(PaymentState::Failed),
            "partially_refunded" => Some(PaymentState::PartiallyRefunded),
            "refunded" => Some(PaymentState::Refunded),
            _ => None,
        }
    }

    /// States an order may move from into `self`. Transitions only run
    /// forward; `PartiallyRefunded` may repeat.
    pub fn allowed_sources(&self) -> &'static [PaymentState] {
        match self {
            PaymentState::Pending => &[],
            PaymentState::AwaitingConfirmation => {
                &[PaymentState::Pending, PaymentState::AwaitingConfirmation]
            }
            PaymentState::Paid | PaymentState::Failed => {
                &[PaymentState::Pending, PaymentState::AwaitingConfirmation]
            }
            PaymentState::PartiallyRefunded | PaymentState::Refunded => {
                &[PaymentState::Paid, PaymentState::PartiallyRefunded]
            }
        }
    }

    pub fn can_transition_to(&self, next: PaymentState) -> bool {
        next.allowed_sources().contains(self)
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, PaymentState::Pending | PaymentState::AwaitingConfirmation)
    }

    pub fn is_refundable(&self) -> bool {
        matches!(self, PaymentState::Paid | PaymentState::PartiallyRefunded)
    }
}

/// The slice of a storefront order the payment core reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub store_id: String,
    pub order_number: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_status: PaymentState,
    pub payment_gateway: Option<GatewayName>,
    pub payment_reference: Option<String>,
    pub payment_test_mode: Option<bool>,
    pub payment_transaction_id: Option<String>,
    pub payment_failure_reason: Option<String>,
    pub refund_amount: Decimal,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(store_id: &str, id: i64, order_number: &str, total_amount: Decimal, currency: &str) -> Self {
        Self {
            id,
            store_id: store_id.to_string(),
            order_number: order_number.to_string(),
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            total_amount,
            currency: currency.to_string(),
            payment_status: PaymentState::Pending,
            payment_gateway: None,
            payment_reference: None,
            payment_test_mode: None,
            payment_transaction_id: None,
            payment_failure_reason: None,
            refund_amount: Decimal::ZERO,
            refund_reason: None,
            refunded_at: None,
            confirmed_at: None,
        }
    }

    pub fn refundable_amount(&self) -> Decimal {
        (self.total_amount - self.refund_amount).max(Decimal::ZERO)
    }
}

/// Provider-side order reference, scoped so that test-mode and live-mode
/// references from the same provider never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    pub store_id: String,
    pub gateway_name: GatewayName,
    pub is_test_mode: bool,
    pub reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        assert!(PaymentState::Pending.can_transition_to(PaymentState::AwaitingConfirmation));
        assert!(PaymentState::AwaitingConfirmation.can_transition_to(PaymentState::Paid));
        assert!(PaymentState::AwaitingConfirmation.can_transition_to(PaymentState::Failed));
        assert!(PaymentState::Paid.can_transition_to(PaymentState::PartiallyRefunded));
        assert!(PaymentState::PartiallyRefunded.can_transition_to(PaymentState::PartiallyRefunded));
        assert!(PaymentState::PartiallyRefunded.can_transition_to(PaymentState::Refunded));

        assert!(!PaymentState::Paid.can_transition_to(PaymentState::Failed));
        assert!(!PaymentState::Failed.can_transition_to(PaymentState::Paid));
        assert!(!PaymentState::Refunded.can_transition_to(PaymentState::PartiallyRefunded));
        assert!(!PaymentState::Pending.can_transition_to(PaymentState::Refunded));
    }

    #[test]
    fn state_names_round_trip() {
        for s in [
            PaymentState::Pending,
            PaymentState::AwaitingConfirmation,
            PaymentState::Paid,
            PaymentState::Failed,
            PaymentState::PartiallyRefunded,
            PaymentState::Refunded,
        ] {
            assert_eq!(PaymentState::parse(s.as_str()), Some(s));
        }
    }
}
