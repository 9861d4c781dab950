//! Token amounts.
//!
//! Amounts are `rust_decimal::Decimal` values with two decimal places, stored as
//! `NUMERIC(12, 2)`. They serialize as JSON floats.

use crate::errors::{LedgerError, LedgerResult};
use rust_decimal::Decimal;

/// Decimal places carried by every amount
pub const SCALE: u32 = 2;

/// Exclusive upper bound of a `NUMERIC(12, 2)` column
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Validate an amount that moves value
///
/// # Errors
///
/// * `LedgerError::InvalidAmount` - Zero, negative, finer than two decimal places,
///   or too large to store
pub fn validate_amount(amount: Decimal) -> LedgerResult<Decimal> {
    if amount <= Decimal::ZERO || amount >= AMOUNT_LIMIT || amount.normalize().scale() > SCALE {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(amount.round_dp(SCALE))
}

/// Parse a user-supplied amount such as `"15.50"`
pub fn parse_amount(raw: &str) -> LedgerResult<Decimal> {
    let amount: Decimal = raw
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(Decimal::ZERO))?;
    validate_amount(amount)
}

/// Price times quantity
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    (unit_price * Decimal::from(quantity)).round_dp(SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_amount_accepts_cents() {
        assert_eq!(validate_amount(dec!(10.00)).unwrap(), dec!(10.00));
        assert_eq!(validate_amount(dec!(0.01)).unwrap(), dec!(0.01));
        // Trailing zeros beyond two places are not extra precision
        assert_eq!(validate_amount(dec!(1.5000)).unwrap(), dec!(1.50));
    }

    #[test]
    fn test_validate_amount_rejects_non_positive() {
        assert!(matches!(
            validate_amount(Decimal::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(dec!(-5)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_validate_amount_rejects_sub_cent() {
        assert!(matches!(
            validate_amount(dec!(0.001)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_validate_amount_rejects_unstorable() {
        assert_eq!(AMOUNT_LIMIT, dec!(10000000000));
        assert!(validate_amount(dec!(9999999999.99)).is_ok());
        assert!(matches!(
            validate_amount(dec!(10000000000)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(parse_amount("10000000000.00").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 15.50 ").unwrap(), dec!(15.50));
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-1").is_err());
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dec!(15.00), 1), dec!(15.00));
        assert_eq!(line_total(dec!(2.35), 3), dec!(7.05));
    }
}
