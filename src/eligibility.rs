use crate::domain::gateway::GatewayConfig;
use rust_decimal::Decimal;

pub fn is_amount_supported(config: &GatewayConfig, amount: Decimal) -> bool {
    if amount < config.min_amount {
        return false;
    }
    !config.max_amount.is_some_and(|max| amount > max)
}

pub fn is_currency_supported(config: &GatewayConfig, currency: &str) -> bool {
    let wanted = currency.trim();
    config
        .supported_currencies
        .iter()
        .any(|c| c.trim().eq_ignore_ascii_case(wanted))
}

/// Active gateways ordered by descending priority. The sort is stable, so
/// equal priorities keep the order the store handed them in.
pub fn select_active_gateways(
    gateways: impl IntoIterator<Item = GatewayConfig>,
    currency: Option<&str>,
) -> Vec<GatewayConfig> {
    let mut active: Vec<GatewayConfig> = gateways.into_iter().filter(|g| g.is_active).collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority));
    if let Some(currency) = currency {
        active.retain(|g| is_currency_supported(g, currency));
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{GatewayName, GatewayType};
    use rust_decimal_macros::dec;

    fn gateway(name: &str, priority: i32, active: bool, currencies: &[&str]) -> GatewayConfig {
        let mut gw = GatewayConfig::new(
            "s1",
            GatewayName::from(name),
            GatewayType::Online,
            name,
            chrono::Utc::now(),
        );
        gw.priority = priority;
        gw.is_active = active;
        gw.supported_currencies = currencies.iter().map(|c| c.to_string()).collect();
        gw
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let mut gw = gateway("razorpay", 1, true, &["INR"]);
        gw.min_amount = dec!(1.00);
        gw.max_amount = Some(dec!(500.00));

        assert!(!is_amount_supported(&gw, dec!(0.99)));
        assert!(is_amount_supported(&gw, dec!(1.00)));
        assert!(is_amount_supported(&gw, dec!(500.00)));
        assert!(!is_amount_supported(&gw, dec!(500.01)));

        gw.max_amount = None;
        assert!(is_amount_supported(&gw, dec!(10000000.00)));
    }

    #[test]
    fn currency_membership_ignores_case() {
        let gw = gateway("paypal", 1, true, &["usd", "EUR"]);
        assert!(is_currency_supported(&gw, "USD"));
        assert!(is_currency_supported(&gw, "eur"));
        assert!(!is_currency_supported(&gw, "INR"));
    }

    #[test]
    fn selection_drops_inactive_and_sorts_by_priority() {
        let out = select_active_gateways(
            vec![
                gateway("cod", 1, true, &["INR"]),
                gateway("razorpay", 4, true, &["INR"]),
                gateway("paypal", 9, false, &["INR"]),
                gateway("phonepe", 2, true, &["INR"]),
            ],
            None,
        );
        let names: Vec<&str> = out.iter().map(|g| g.gateway_name.as_str()).collect();
        assert_eq!(names, vec!["razorpay", "phonepe", "cod"]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let out = select_active_gateways(
            vec![
                gateway("alpha", 3, true, &["USD"]),
                gateway("beta", 3, true, &["USD"]),
                gateway("gamma", 5, true, &["USD"]),
                gateway("delta", 3, true, &["USD"]),
            ],
            None,
        );
        let names: Vec<&str> = out.iter().map(|g| g.gateway_name.as_str()).collect();
        assert_eq!(names, vec!["gamma", "alpha", "beta", "delta"]);
    }

    #[test]
    fn currency_filter_applies_after_sort() {
        let out = select_active_gateways(
            vec![
                gateway("razorpay", 4, true, &["INR"]),
                gateway("paypal", 3, true, &["USD", "EUR"]),
                gateway("cod", 1, true, &["INR", "USD"]),
            ],
            Some("usd"),
        );
        let names: Vec<&str> = out.iter().map(|g| g.gateway_name.as_str()).collect();
        assert_eq!(names, vec!["paypal", "cod"]);
    }
}
