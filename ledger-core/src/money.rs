use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

use crate::error::LedgerError;
use crate::error::LedgerResult;

/// `10^decimals`, the scaling factor between a currency's display amount and
/// its stored minor-unit integer.
#[must_use]
pub fn scale_factor(decimals: u8) -> Decimal {
    let mut factor = Decimal::ONE;
    for _ in 0..decimals {
        factor *= Decimal::TEN;
    }
    factor
}

/// Rounds `value` to zero fractional digits using banker's rounding
/// (half-to-even), the only rounding mode this workspace uses for money.
#[must_use]
pub fn round_half_even(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

/// Parses a decimal display string into a minor-unit integer for a currency
/// with `decimals` fractional digits, using half-even rounding to the minor
/// unit.
pub fn parse_decimal_to_minor(raw: &str, decimals: u8) -> LedgerResult<i64> {
    let value: Decimal = raw
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidArgument(format!("not a decimal amount: {raw}")))?;

    let scaled = value * scale_factor(decimals);
    let rounded = round_half_even(scaled);

    rounded
        .try_into()
        .map_err(|_| LedgerError::InvalidArgument(format!("amount out of range: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_two_decimal_currency() {
        assert_eq!(parse_decimal_to_minor("10.00", 2).expect("parse"), 1_000);
        assert_eq!(parse_decimal_to_minor("0.01", 2).expect("parse"), 1);
    }

    #[test]
    fn half_even_rounds_ties_to_even_minor_unit() {
        // 0.125 at 2 decimals rounds to the nearest even cent: 0.12.
        assert_eq!(parse_decimal_to_minor("0.125", 2).expect("parse"), 12);
        // 0.135 rounds up to the even cent 0.14.
        assert_eq!(parse_decimal_to_minor("0.135", 2).expect("parse"), 14);
    }

    #[test]
    fn supports_high_precision_crypto_currencies() {
        assert_eq!(
            parse_decimal_to_minor("500.000000", 6).expect("parse"),
            500_000_000
        );
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(parse_decimal_to_minor("not-a-number", 2).is_err());
    }
}
