//! Customers

use std::fmt;

use decimal_percentage::Percentage;
use rusty_money::{Money, iso::Currency};

use crate::pricing::{PricingError, ensure_currency, percent_of_minor_floor};

/// Identifier of a customer account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerId(String);

impl CustomerId {
    /// Create a customer id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// VIP tier discount, as decided by the customer service.
///
/// How a tier maps to a discount is not known here; the collaborator supplies either a
/// percentage or a flat amount.
#[derive(Debug, Clone, Copy, Default)]
pub enum VipDiscount<'a> {
    /// No VIP benefit
    #[default]
    None,

    /// Percentage off the amount left after voucher and points
    Percentage(Percentage),

    /// Flat amount off the amount left after voucher and points
    Amount(Money<'a, Currency>),
}

impl VipDiscount<'_> {
    /// Discount in minor units on the remaining `base_minor`, never more than the base.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] on currency mismatch or if the percentage overflows.
    pub fn amount_on(&self, base_minor: i64, currency: &Currency) -> Result<i64, PricingError> {
        let base_minor = base_minor.max(0);

        let amount = match self {
            VipDiscount::None => 0,
            VipDiscount::Percentage(percent) => percent_of_minor_floor(percent, base_minor)?,
            VipDiscount::Amount(amount) => {
                ensure_currency(amount, currency)?;
                amount.to_minor_units()
            }
        };

        Ok(amount.clamp(0, base_minor))
    }
}

/// A customer, as far as pricing is concerned.
#[derive(Debug, Clone)]
pub struct Customer<'a> {
    /// Customer identifier
    pub id: CustomerId,

    /// Display name
    pub name: String,

    /// Phone number the customer was looked up by
    pub phone: String,

    /// Redeemable loyalty-point balance
    pub point_balance: u64,

    /// VIP tier benefit
    pub vip: VipDiscount<'a>,
}
