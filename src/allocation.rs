//! Discount allocation
//!
//! Spreads an order-level voucher discount back over the line items so each row can show
//! what it "really" cost. Each row gets a share proportional to its undiscounted line total,
//! converted to a per-unit reduction and floored to the minor unit.
//!
//! The allocation is for display and audit only. Settlement uses the voucher amount itself;
//! the flooring shortfall (at most one minor unit per unit sold) is never pushed back into
//! the order total.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    items::LineItem,
    pricing::{PricingError, checked_sum, ensure_currency, floor_ratio},
};

/// Errors raised while allocating a discount.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    /// Wrapped price arithmetic or currency mismatch error.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Outcome of spreading a discount across line items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation<'a> {
    requested: Money<'a, Currency>,
    allocated: Money<'a, Currency>,
}

impl<'a> Allocation<'a> {
    /// Discount that was asked to be spread
    pub fn requested(&self) -> Money<'a, Currency> {
        self.requested
    }

    /// Sum of per-unit reductions actually shown on the line items
    pub fn allocated(&self) -> Money<'a, Currency> {
        self.allocated
    }

    /// Part of the requested discount lost to flooring.
    pub fn shortfall(&self) -> Money<'a, Currency> {
        let minor = self.requested.to_minor_units() - self.allocated.to_minor_units();

        Money::from_minor(minor.max(0), self.requested.currency())
    }
}

/// Spread `discount` across `items` in proportion to their undiscounted line totals.
///
/// Prices are always derived from each item's undiscounted price, so re-running after the
/// basket changes never compounds an earlier allocation. When the undiscounted subtotal or
/// the discount is not positive nothing is redistributed and every item shows its
/// undiscounted price again.
///
/// # Errors
///
/// Returns [`AllocationError::Pricing`] if an item is priced in a different currency to
/// the discount, or if minor-unit arithmetic overflows.
pub fn allocate_discount<'a, 'i>(
    items: impl IntoIterator<Item = &'i mut LineItem<'a>>,
    discount: &Money<'a, Currency>,
) -> Result<Allocation<'a>, AllocationError>
where
    'a: 'i,
{
    let mut items: SmallVec<[&'i mut LineItem<'a>; 8]> = items.into_iter().collect();
    let currency = discount.currency();

    for item in &items {
        ensure_currency(item.base_unit_price(), currency)?;
    }

    let subtotal = checked_sum(
        items
            .iter()
            .map(|item| item.base_line_total().map(|total| total.to_minor_units()))
            .collect::<Result<SmallVec<[i64; 8]>, _>>()?,
    )?;

    let requested = discount.to_minor_units();

    if subtotal <= 0 || requested <= 0 {
        for item in &mut items {
            item.restore_original_price();
        }

        return Ok(Allocation {
            requested: *discount,
            allocated: Money::from_minor(0, currency),
        });
    }

    let mut allocated = 0_i64;

    for item in &mut items {
        let base = item.base_unit_price().to_minor_units();
        let quantity = i64::from(item.quantity().get());
        let line = base.checked_mul(quantity).ok_or(PricingError::Overflow)?;

        // share = D × line / subtotal, per unit = share / quantity
        let per_unit_denominator = subtotal
            .checked_mul(quantity)
            .ok_or(PricingError::Overflow)?;

        let unit_discount = floor_ratio(requested, line, per_unit_denominator)?;
        let new_price = base.saturating_sub(unit_discount).max(0);

        item.set_allocated_price(Money::from_minor(new_price, currency));

        allocated = (base - new_price)
            .checked_mul(quantity)
            .and_then(|reduction| allocated.checked_add(reduction))
            .ok_or(PricingError::Overflow)?;
    }

    Ok(Allocation {
        requested: *discount,
        allocated: Money::from_minor(allocated, currency),
    })
}

/// Remove any allocated discount, restoring every item's undiscounted unit price.
pub fn clear_allocation<'a: 'i, 'i>(items: impl IntoIterator<Item = &'i mut LineItem<'a>>) {
    for item in items {
        item.restore_original_price();
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use rusty_money::iso::{GBP, VND};
    use testresult::TestResult;

    use crate::catalog::VariantId;

    use super::*;

    fn item<'a>(id: &str, unit: i64, quantity: u32) -> Result<LineItem<'a>, &'static str> {
        let quantity = NonZeroU32::new(quantity).ok_or("zero quantity")?;

        Ok(LineItem::new(
            VariantId::new(id),
            id,
            quantity,
            Money::from_minor(unit, VND),
        ))
    }

    fn reduction(items: &[LineItem<'_>]) -> i64 {
        items
            .iter()
            .map(|item| {
                let original = item.base_unit_price().to_minor_units();
                let current = item.unit_price().to_minor_units();

                (original - current) * i64::from(item.quantity().get())
            })
            .sum()
    }

    #[test]
    fn allocation_is_proportional() -> TestResult {
        let mut items = [item("a", 300_000, 1)?, item("b", 700_000, 1)?];

        let allocation = allocate_discount(&mut items, &Money::from_minor(80_000, VND))?;

        assert_eq!(items[0].unit_price(), &Money::from_minor(276_000, VND));
        assert_eq!(items[1].unit_price(), &Money::from_minor(644_000, VND));
        assert_eq!(allocation.allocated(), Money::from_minor(80_000, VND));
        assert_eq!(allocation.shortfall(), Money::from_minor(0, VND));

        Ok(())
    }

    #[test]
    fn flooring_shortfall_is_kept() -> TestResult {
        let mut items = [item("a", 100, 1)?, item("b", 100, 1)?, item("c", 100, 1)?];

        let allocation = allocate_discount(&mut items, &Money::from_minor(100, VND))?;

        // 33 + 33 + 33 = 99, the missing unit is not redistributed.
        assert_eq!(allocation.allocated(), Money::from_minor(99, VND));
        assert_eq!(allocation.shortfall(), Money::from_minor(1, VND));
        assert_eq!(reduction(&items), 99);

        Ok(())
    }

    #[test]
    fn per_unit_discount_uses_quantity() -> TestResult {
        let mut items = [item("a", 250_000, 2)?, item("b", 500_000, 1)?];

        allocate_discount(&mut items, &Money::from_minor(100_000, VND))?;

        // a: share 50000 over 2 units, b: share 50000 over 1 unit.
        assert_eq!(items[0].unit_price(), &Money::from_minor(225_000, VND));
        assert_eq!(items[1].unit_price(), &Money::from_minor(450_000, VND));

        Ok(())
    }

    #[test]
    fn reallocation_uses_original_prices() -> TestResult {
        let mut items = [item("a", 300_000, 1)?, item("b", 700_000, 1)?];

        allocate_discount(&mut items, &Money::from_minor(80_000, VND))?;
        allocate_discount(&mut items, &Money::from_minor(80_000, VND))?;

        assert_eq!(items[0].unit_price(), &Money::from_minor(276_000, VND));
        assert_eq!(
            items[0].original_unit_price(),
            Some(&Money::from_minor(300_000, VND))
        );

        Ok(())
    }

    #[test]
    fn zero_discount_redistributes_nothing() -> TestResult {
        let mut items = [item("a", 300_000, 1)?];

        allocate_discount(&mut items, &Money::from_minor(50_000, VND))?;
        let allocation = allocate_discount(&mut items, &Money::from_minor(0, VND))?;

        assert_eq!(allocation.allocated(), Money::from_minor(0, VND));
        assert_eq!(items[0].unit_price(), &Money::from_minor(300_000, VND));
        assert!(items[0].original_unit_price().is_none());

        Ok(())
    }

    #[test]
    fn zero_subtotal_redistributes_nothing() -> TestResult {
        let mut items = [item("free", 0, 3)?];

        let allocation = allocate_discount(&mut items, &Money::from_minor(50_000, VND))?;

        assert_eq!(allocation.allocated(), Money::from_minor(0, VND));
        assert_eq!(items[0].unit_price(), &Money::from_minor(0, VND));

        Ok(())
    }

    #[test]
    fn discount_above_subtotal_never_goes_negative() -> TestResult {
        let mut items = [item("a", 1_000, 1)?, item("b", 3_000, 2)?];

        allocate_discount(&mut items, &Money::from_minor(1_000_000, VND))?;

        assert!(items.iter().all(|item| item.unit_price().to_minor_units() >= 0));

        Ok(())
    }

    #[test]
    fn clear_restores_every_price() -> TestResult {
        let mut items = [item("a", 123_457, 3)?, item("b", 99_999, 1)?];
        let before = items.clone();

        allocate_discount(&mut items, &Money::from_minor(77_777, VND))?;
        clear_allocation(&mut items);

        assert_eq!(items, before);

        Ok(())
    }

    #[test]
    fn mismatched_currency_is_rejected() -> TestResult {
        let mut items = [item("a", 300_000, 1)?];

        let result = allocate_discount(&mut items, &Money::from_minor(10, GBP));

        assert!(matches!(
            result,
            Err(AllocationError::Pricing(PricingError::CurrencyMismatch { .. }))
        ));

        Ok(())
    }
}
