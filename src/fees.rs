use crate::domain::gateway::{FeeType, GatewayConfig};
use crate::error::{PaymentError, PaymentResult};
use rust_decimal::{Decimal, RoundingStrategy};

pub const FEE_SCALE: u32 = 2;

/// Transaction fee for `amount` under the gateway's fee schedule, rounded to
/// 2 dp with ties away from zero.
pub fn calculate_fee(config: &GatewayConfig, amount: Decimal) -> PaymentResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PaymentError::InvalidAmount(format!(
            "amount must be >= 0, got {}",
            amount
        )));
    }

    let raw = match config.fee_type {
        FeeType::Percentage => amount * config.fee_rate,
        FeeType::Fixed => config.fixed_fee,
        FeeType::Mixed => amount * config.fee_rate + config.fixed_fee,
    };

    Ok(round_money(raw))
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FEE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{GatewayName, GatewayType};
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn gateway(fee_type: FeeType, fee_rate: Decimal, fixed_fee: Decimal) -> GatewayConfig {
        let mut gw = GatewayConfig::new(
            "s1",
            GatewayName::Razorpay,
            GatewayType::Online,
            "Razorpay",
            chrono::Utc::now(),
        );
        gw.fee_type = fee_type;
        gw.fee_rate = fee_rate;
        gw.fixed_fee = fixed_fee;
        gw
    }

    #[test]
    fn mixed_fee_matches_reference_value() {
        let gw = gateway(FeeType::Mixed, dec!(0.029), dec!(2.00));
        assert_eq!(calculate_fee(&gw, dec!(100.00)).unwrap(), dec!(4.90));
    }

    #[test]
    fn percentage_and_fixed() {
        let pct = gateway(FeeType::Percentage, dec!(0.02), dec!(5.00));
        assert_eq!(calculate_fee(&pct, dec!(250.00)).unwrap(), dec!(5.00));

        let fixed = gateway(FeeType::Fixed, dec!(0.02), dec!(3.50));
        assert_eq!(calculate_fee(&fixed, dec!(9999.99)).unwrap(), dec!(3.50));
        assert_eq!(calculate_fee(&fixed, dec!(0)).unwrap(), dec!(3.50));
    }

    #[test]
    fn ties_round_away_from_zero() {
        let gw = gateway(FeeType::Percentage, dec!(0.025), dec!(0));
        // 5.00 * 0.025 = 0.125
        assert_eq!(calculate_fee(&gw, dec!(5.00)).unwrap(), dec!(0.13));
        // 4.20 * 0.025 = 0.105
        assert_eq!(calculate_fee(&gw, dec!(4.20)).unwrap(), dec!(0.11));
    }

    #[test]
    fn deterministic_and_non_negative() {
        let gw = gateway(FeeType::Mixed, dec!(0.0175), dec!(0.30));
        for amount in [dec!(0), dec!(0.01), dec!(19.99), dec!(1234.56)] {
            let a = calculate_fee(&gw, amount).unwrap();
            let b = calculate_fee(&gw, amount).unwrap();
            assert_eq!(a, b);
            assert!(a >= Decimal::ZERO);
        }
    }

    #[test]
    fn negative_amount_is_rejected() {
        let gw = gateway(FeeType::Percentage, dec!(0.02), dec!(0));
        let err = calculate_fee(&gw, dec!(-1.00)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }
}
