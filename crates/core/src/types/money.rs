//! Currency display helpers.
//!
//! All monetary amounts in Espiga are `rust_decimal::Decimal` pesos. The
//! backend owns rounding rules for stored totals; the dashboard only needs a
//! consistent two-decimal display form.

use rust_decimal::Decimal;

/// Format an amount as pesos with two decimals, e.g. `$1250.50`.
///
/// Negative amounts keep the sign before the `$`: `-$10.00`.
#[must_use]
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded.is_sign_negative() {
        format!("-${:.2}", -rounded)
    } else {
        format!("${rounded:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_currency_two_decimals() {
        assert_eq!(format_currency(dec!(1250.5)), "$1250.50");
        assert_eq!(format_currency(dec!(0)), "$0.00");
        assert_eq!(format_currency(dec!(3)), "$3.00");
    }

    #[test]
    fn test_format_currency_rounds() {
        assert_eq!(format_currency(dec!(1.005)), "$1.01");
        assert_eq!(format_currency(dec!(2.994)), "$2.99");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(dec!(-10)), "-$10.00");
    }
}
