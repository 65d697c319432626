//! Loyalty points
//!
//! Points are earned in whole blocks of spend and redeemed at the same rate: with
//! `reward_money_per_point = 100000` and `reward_point_per_money = 10`, every full 100000
//! spent earns 10 points and each point redeems for 10000.

use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::pricing::{PricingError, ensure_currency, floor_ratio};

/// Errors raised when configuring loyalty rates.
#[derive(Debug, Error, PartialEq)]
pub enum LoyaltyError {
    /// The spend block must be a positive amount.
    #[error("reward money per point must be positive, got {0}")]
    InvalidMoneyRate(i64),

    /// At least one point must be awarded per block.
    #[error("reward points per money must be positive")]
    InvalidPointRate,
}

/// Conversion rates between spend and loyalty points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoyaltyRates<'a> {
    reward_money_per_point: Money<'a, Currency>,
    reward_point_per_money: u32,
}

impl<'a> LoyaltyRates<'a> {
    /// Create loyalty rates.
    ///
    /// # Errors
    ///
    /// Returns a [`LoyaltyError`] if either rate is not positive.
    pub fn new(
        reward_money_per_point: Money<'a, Currency>,
        reward_point_per_money: u32,
    ) -> Result<Self, LoyaltyError> {
        let money_minor = reward_money_per_point.to_minor_units();

        if money_minor <= 0 {
            return Err(LoyaltyError::InvalidMoneyRate(money_minor));
        }

        if reward_point_per_money == 0 {
            return Err(LoyaltyError::InvalidPointRate);
        }

        Ok(Self {
            reward_money_per_point,
            reward_point_per_money,
        })
    }

    /// Spend that earns one block of points.
    pub fn reward_money_per_point(&self) -> Money<'a, Currency> {
        self.reward_money_per_point
    }

    /// Points earned per block of spend.
    pub fn reward_point_per_money(&self) -> u32 {
        self.reward_point_per_money
    }

    /// Money value of redeeming `points`, truncated to the minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the value does not fit in minor units.
    pub fn redemption_value(&self, points: u64) -> Result<Money<'a, Currency>, PricingError> {
        let points = i64::try_from(points).map_err(|_err| PricingError::Overflow)?;

        let minor = floor_ratio(
            points,
            self.reward_money_per_point.to_minor_units(),
            i64::from(self.reward_point_per_money),
        )?;

        Ok(Money::from_minor(minor, self.reward_money_per_point.currency()))
    }

    /// Points earned on `spend`: whole blocks of spend times the points per block.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if `spend` is in another currency or the result overflows.
    pub fn points_earned(&self, spend: &Money<'_, Currency>) -> Result<u64, PricingError> {
        ensure_currency(spend, self.reward_money_per_point.currency())?;

        let blocks = floor_ratio(
            spend.to_minor_units().max(0),
            1,
            self.reward_money_per_point.to_minor_units(),
        )?;

        let blocks = u64::try_from(blocks).map_err(|_err| PricingError::Overflow)?;

        blocks
            .checked_mul(u64::from(self.reward_point_per_money))
            .ok_or(PricingError::Overflow)
    }
}

/// Clamp a redemption request to what the customer holds.
pub fn clamp_redeemable(requested: u64, balance: u64) -> u64 {
    requested.min(balance)
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, VND};
    use testresult::TestResult;

    use super::*;

    fn rates<'a>() -> Result<LoyaltyRates<'a>, LoyaltyError> {
        LoyaltyRates::new(Money::from_minor(100_000, VND), 10)
    }

    #[test]
    fn rates_reject_zero_values() {
        assert_eq!(
            LoyaltyRates::new(Money::from_minor(0, VND), 10),
            Err(LoyaltyError::InvalidMoneyRate(0))
        );
        assert_eq!(
            LoyaltyRates::new(Money::from_minor(100_000, VND), 0),
            Err(LoyaltyError::InvalidPointRate)
        );
    }

    #[test]
    fn three_points_redeem_for_thirty_thousand() -> TestResult {
        assert_eq!(
            rates()?.redemption_value(3)?,
            Money::from_minor(30_000, VND)
        );

        Ok(())
    }

    #[test]
    fn points_are_earned_per_whole_block() -> TestResult {
        let rates = rates()?;

        assert_eq!(rates.points_earned(&Money::from_minor(1_000_000, VND))?, 100);
        assert_eq!(rates.points_earned(&Money::from_minor(199_999, VND))?, 10);
        assert_eq!(rates.points_earned(&Money::from_minor(99_999, VND))?, 0);

        Ok(())
    }

    #[test]
    fn points_earned_rejects_other_currency() -> TestResult {
        let result = rates()?.points_earned(&Money::from_minor(100, GBP));

        assert!(matches!(result, Err(PricingError::CurrencyMismatch { .. })));

        Ok(())
    }

    #[test]
    fn redemption_is_clamped_to_balance() {
        assert_eq!(clamp_redeemable(50, 20), 20);
        assert_eq!(clamp_redeemable(5, 20), 5);
    }
}
