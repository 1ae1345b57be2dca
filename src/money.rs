//! Provider amount representations.
//!
//! Each adapter declares its [`AmountUnit`] as a constant. Conversions never
//! truncate: an amount that does not land on a whole minor unit is rejected.

use crate::error::{PaymentError, PaymentResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountUnit {
    /// Integer count of minor units (paise, cents).
    Minor { multiplier: i64 },
    /// Decimal string in major units with a fixed number of places.
    Major { scale: u32 },
}

impl AmountUnit {
    pub fn to_minor(&self, amount: Decimal) -> PaymentResult<i64> {
        let AmountUnit::Minor { multiplier } = *self else {
            return Err(PaymentError::InvalidAmount(
                "provider does not take minor units".to_string(),
            ));
        };
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PaymentError::InvalidAmount(format!("negative amount {}", amount)));
        }
        let scaled = amount * Decimal::from(multiplier);
        if scaled.fract() != Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(format!(
                "{} is not a whole number of minor units (x{})",
                amount, multiplier
            )));
        }
        scaled
            .to_i64()
            .ok_or_else(|| PaymentError::InvalidAmount(format!("{} overflows minor units", amount)))
    }

    pub fn from_minor(&self, minor: i64) -> Decimal {
        match *self {
            AmountUnit::Minor { multiplier } => {
                let scale = multiplier.max(1).to_string().len() as u32 - 1;
                Decimal::new(minor, scale)
            }
            AmountUnit::Major { .. } => Decimal::from(minor),
        }
    }

    pub fn to_major_string(&self, amount: Decimal) -> PaymentResult<String> {
        let AmountUnit::Major { scale } = *self else {
            return Err(PaymentError::InvalidAmount(
                "provider does not take decimal strings".to_string(),
            ));
        };
        if amount.round_dp(scale) != amount {
            return Err(PaymentError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                amount, scale
            )));
        }
        let mut fixed = amount;
        fixed.rescale(scale);
        Ok(fixed.to_string())
    }

    pub fn parse_major(&self, value: &str) -> PaymentResult<Decimal> {
        value
            .trim()
            .parse::<Decimal>()
            .map_err(|e| PaymentError::InvalidAmount(format!("unparseable amount {:?}: {}", value, e)))
    }
}
