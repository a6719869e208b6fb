//! Monetary helpers.
//!
//! CRITICAL: Never use floating-point for money calculations. All amounts are
//! `rust_decimal::Decimal` with two fractional digits once they reach the ledger.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::EngineError;

/// Number of fractional digits kept for ledger amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to cents, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes a commission from a deal value and a rate.
#[must_use]
pub fn commission_for(value: Decimal, rate: Decimal) -> Decimal {
    round_money(value * rate)
}

/// Validates a commission rate (a fraction between 0 and 1 inclusive).
pub fn validate_rate(rate: Decimal) -> Result<Decimal, EngineError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(EngineError::Validation(format!(
            "commission rate must be between 0 and 1, got {rate}"
        )));
    }
    Ok(rate)
}

/// Validates a strictly positive amount.
pub fn validate_positive(field: &str, amount: Decimal) -> Result<Decimal, EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(amount)
}

/// Validates a free-text reason required for privileged operations.
pub fn require_reason(reason: &str) -> Result<String, EngineError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation("a reason is required".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(1000), dec!(0.10), dec!(100.00))]
    #[case(dec!(333.33), dec!(0.15), dec!(50.00))]
    #[case(dec!(0.05), dec!(0.10), dec!(0.01))]
    #[case(dec!(12345.67), dec!(0), dec!(0))]
    fn test_commission_for(
        #[case] value: Decimal,
        #[case] rate: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(commission_for(value, rate), expected);
    }

    #[test]
    fn test_round_midpoint_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[rstest]
    #[case(dec!(0), true)]
    #[case(dec!(1), true)]
    #[case(dec!(0.25), true)]
    #[case(dec!(-0.01), false)]
    #[case(dec!(1.01), false)]
    fn test_validate_rate(#[case] rate: Decimal, #[case] ok: bool) {
        assert_eq!(validate_rate(rate).is_ok(), ok);
    }

    #[test]
    fn test_require_reason_trims() {
        assert_eq!(require_reason("  fraud review ").unwrap(), "fraud review");
        assert!(matches!(require_reason("   "), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("estimated value", dec!(0.01)).is_ok());
        assert!(validate_positive("estimated value", dec!(0)).is_err());
    }
}
