//! Prices

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;

/// Errors that can occur while doing price arithmetic.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// A price was given in a different currency to the one being calculated in.
    #[error("price has currency {actual}, but expected currency {expected}")]
    CurrencyMismatch {
        /// Currency the calculation is working in
        expected: &'static str,

        /// Currency of the offending price
        actual: &'static str,
    },

    /// Minor-unit arithmetic overflowed.
    #[error("price arithmetic overflowed")]
    Overflow,

    /// A ratio was requested against a zero denominator.
    #[error("cannot divide a price by zero")]
    ZeroDenominator,

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// Ensure a price is denominated in the expected currency.
///
/// # Errors
///
/// Returns [`PricingError::CurrencyMismatch`] when the currencies differ.
pub fn ensure_currency(price: &Money<'_, Currency>, expected: &Currency) -> Result<(), PricingError> {
    if price.currency() == expected {
        Ok(())
    } else {
        Err(PricingError::CurrencyMismatch {
            expected: expected.iso_alpha_code,
            actual: price.currency().iso_alpha_code,
        })
    }
}

/// Multiply a unit price (in minor units) by a quantity.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the product does not fit in an `i64`.
pub fn line_total_minor(unit_minor: i64, quantity: u32) -> Result<i64, PricingError> {
    unit_minor
        .checked_mul(i64::from(quantity))
        .ok_or(PricingError::Overflow)
}

/// Sum minor-unit amounts, failing on overflow.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the sum does not fit in an `i64`.
pub fn checked_sum(amounts: impl IntoIterator<Item = i64>) -> Result<i64, PricingError> {
    amounts.into_iter().try_fold(0_i64, |acc, amount| {
        acc.checked_add(amount).ok_or(PricingError::Overflow)
    })
}

/// Calculate `floor(value × numerator / denominator)` exactly, in minor units.
///
/// Integer arithmetic is used throughout so that results which land exactly on a minor
/// unit are never floored down by representation error.
///
/// # Errors
///
/// - [`PricingError::ZeroDenominator`]: `denominator` is zero.
/// - [`PricingError::Overflow`]: the result does not fit in an `i64`.
pub fn floor_ratio(value: i64, numerator: i64, denominator: i64) -> Result<i64, PricingError> {
    if denominator == 0 {
        return Err(PricingError::ZeroDenominator);
    }

    let product = i128::from(value) * i128::from(numerator);
    let quotient = product.div_euclid(i128::from(denominator));

    // `div_euclid` rounds towards negative infinity only for positive denominators.
    let floored = if denominator < 0 && product.rem_euclid(i128::from(denominator)) != 0 {
        quotient - 1
    } else {
        quotient
    };

    i64::try_from(floored).map_err(|_err| PricingError::Overflow)
}

/// Calculate a percentage of a minor-unit amount, truncated to whole minor units.
///
/// # Errors
///
/// Returns [`PricingError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor_floor(percent: &Percentage, minor: i64) -> Result<i64, PricingError> {
    let minor = Decimal::from_i64(minor).ok_or(PricingError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(PricingError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_i64()
        .ok_or(PricingError::PercentConversion)
}

/// Build a percentage from a "percent points" value, e.g. `10` for 10%.
///
/// Returns `None` if the value is negative or above 100.
pub fn percentage_from_points(points: Decimal) -> Option<Percentage> {
    if points.is_sign_negative() || points > Decimal::ONE_HUNDRED {
        return None;
    }

    Some(Percentage::from(points / Decimal::ONE_HUNDRED))
}

/// Find a supported currency by ISO code.
pub fn currency_from_code(code: &str) -> Option<&'static Currency> {
    match code.trim().to_ascii_uppercase().as_str() {
        "VND" => Some(iso::VND),
        "USD" => Some(iso::USD),
        "EUR" => Some(iso::EUR),
        "GBP" => Some(iso::GBP),
        _ => None,
    }
}

/// A zero amount in the given currency.
pub fn zero(currency: &Currency) -> Money<'_, Currency> {
    Money::from_minor(0, currency)
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, VND};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn ensure_currency_rejects_other_currency() {
        let price = Money::from_minor(100, GBP);

        assert_eq!(
            ensure_currency(&price, VND),
            Err(PricingError::CurrencyMismatch {
                expected: "VND",
                actual: "GBP",
            })
        );
    }

    #[test]
    fn line_total_overflow_is_reported() {
        assert_eq!(line_total_minor(i64::MAX, 2), Err(PricingError::Overflow));
    }

    #[test]
    fn floor_ratio_floors_positive_results() -> TestResult {
        assert_eq!(floor_ratio(100, 1, 3)?, 33);
        assert_eq!(floor_ratio(80_000, 300_000, 1_000_000)?, 24_000);

        Ok(())
    }

    #[test]
    fn floor_ratio_is_exact_on_whole_results() -> TestResult {
        // 3 × 100000 / 10 lands exactly on 30000.
        assert_eq!(floor_ratio(3, 100_000, 10)?, 30_000);

        Ok(())
    }

    #[test]
    fn floor_ratio_rejects_zero_denominator() {
        assert_eq!(floor_ratio(1, 1, 0), Err(PricingError::ZeroDenominator));
    }

    #[test]
    fn percent_of_minor_floor_truncates() -> TestResult {
        let percent = Percentage::from(Decimal::new(1, 1));

        assert_eq!(percent_of_minor_floor(&percent, 1_000_000)?, 100_000);
        assert_eq!(percent_of_minor_floor(&percent, 99)?, 9);

        Ok(())
    }

    #[test]
    fn percentage_from_points_bounds() {
        assert!(percentage_from_points(Decimal::new(10, 0)).is_some());
        assert!(percentage_from_points(Decimal::new(101, 0)).is_none());
        assert!(percentage_from_points(Decimal::new(-1, 0)).is_none());
    }

    #[test]
    fn currency_lookup_is_case_insensitive() {
        assert_eq!(currency_from_code("vnd"), Some(VND));
        assert_eq!(currency_from_code("XXX"), None);
    }
}
