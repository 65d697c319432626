//! Line items

use std::num::NonZeroU32;

use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;

use crate::{
    catalog::VariantId,
    pricing::{PricingError, line_total_minor},
};

new_key_type! {
    /// Line Item Key
    pub struct LineItemKey;
}

/// One order row: a variant, a quantity and the per-unit price it is charged at.
///
/// While a voucher is allocated across the order, `unit_price` holds the voucher-reduced
/// display price and `original_unit_price` holds the snapshot of the price before the
/// voucher. The snapshot is always at least the unit price.
#[derive(Clone, Debug, PartialEq)]
pub struct LineItem<'a> {
    variant_id: VariantId,
    name: String,
    quantity: NonZeroU32,
    unit_price: Money<'a, Currency>,
    original_unit_price: Option<Money<'a, Currency>>,
}

impl<'a> LineItem<'a> {
    /// Creates a new line item at the given unit price, with no voucher applied.
    pub fn new(
        variant_id: VariantId,
        name: impl Into<String>,
        quantity: NonZeroU32,
        unit_price: Money<'a, Currency>,
    ) -> Self {
        Self {
            variant_id,
            name: name.into(),
            quantity,
            unit_price,
            original_unit_price: None,
        }
    }

    /// Returns the variant this row sells
    pub fn variant_id(&self) -> &VariantId {
        &self.variant_id
    }

    /// Returns the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the quantity
    pub fn quantity(&self) -> NonZeroU32 {
        self.quantity
    }

    /// Returns the displayed unit price, which may be voucher-reduced
    pub fn unit_price(&self) -> &Money<'a, Currency> {
        &self.unit_price
    }

    /// Returns the pre-voucher unit price, if a voucher has reduced this row
    pub fn original_unit_price(&self) -> Option<&Money<'a, Currency>> {
        self.original_unit_price.as_ref()
    }

    /// Returns the undiscounted unit price: the snapshot if present, the unit price otherwise.
    pub fn base_unit_price(&self) -> &Money<'a, Currency> {
        self.original_unit_price.as_ref().unwrap_or(&self.unit_price)
    }

    /// Whether a voucher currently reduces this row.
    pub fn is_discounted(&self) -> bool {
        self.original_unit_price.is_some()
    }

    /// Line total at the displayed unit price.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the total does not fit in minor units.
    pub fn line_total(&self) -> Result<Money<'a, Currency>, PricingError> {
        let minor = line_total_minor(self.unit_price.to_minor_units(), self.quantity.get())?;

        Ok(Money::from_minor(minor, self.unit_price.currency()))
    }

    /// Line total at the undiscounted unit price.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the total does not fit in minor units.
    pub fn base_line_total(&self) -> Result<Money<'a, Currency>, PricingError> {
        let base = self.base_unit_price();
        let minor = line_total_minor(base.to_minor_units(), self.quantity.get())?;

        Ok(Money::from_minor(minor, base.currency()))
    }

    pub(crate) fn set_quantity(&mut self, quantity: NonZeroU32) {
        self.quantity = quantity;
    }

    /// Show `price` as the allocated unit price, snapshotting the undiscounted price.
    ///
    /// A price at or above the undiscounted price drops the snapshot instead.
    pub(crate) fn set_allocated_price(&mut self, price: Money<'a, Currency>) {
        let base = *self.base_unit_price();

        if price.to_minor_units() < base.to_minor_units() {
            self.original_unit_price = Some(base);
            self.unit_price = price;
        } else {
            self.original_unit_price = None;
            self.unit_price = base;
        }
    }

    /// Restore the undiscounted unit price and drop the snapshot.
    pub(crate) fn restore_original_price(&mut self) {
        if let Some(original) = self.original_unit_price.take() {
            self.unit_price = original;
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::VND;
    use testresult::TestResult;

    use super::*;

    fn item<'a>(unit: i64, quantity: u32) -> Result<LineItem<'a>, &'static str> {
        let quantity = NonZeroU32::new(quantity).ok_or("zero quantity")?;

        Ok(LineItem::new(
            VariantId::new("v-1"),
            "Linen shirt",
            quantity,
            Money::from_minor(unit, VND),
        ))
    }

    #[test]
    fn line_total_multiplies_quantity() -> TestResult {
        let item = item(250_000, 3)?;

        assert_eq!(item.line_total()?, Money::from_minor(750_000, VND));

        Ok(())
    }

    #[test]
    fn allocated_price_snapshots_original() -> TestResult {
        let mut item = item(250_000, 2)?;

        item.set_allocated_price(Money::from_minor(230_000, VND));

        assert_eq!(item.unit_price(), &Money::from_minor(230_000, VND));
        assert_eq!(
            item.original_unit_price(),
            Some(&Money::from_minor(250_000, VND))
        );
        assert_eq!(item.base_line_total()?, Money::from_minor(500_000, VND));
        assert_eq!(item.line_total()?, Money::from_minor(460_000, VND));

        Ok(())
    }

    #[test]
    fn reallocation_keeps_first_snapshot() -> TestResult {
        let mut item = item(250_000, 1)?;

        item.set_allocated_price(Money::from_minor(230_000, VND));
        item.set_allocated_price(Money::from_minor(240_000, VND));

        assert_eq!(item.unit_price(), &Money::from_minor(240_000, VND));
        assert_eq!(
            item.original_unit_price(),
            Some(&Money::from_minor(250_000, VND))
        );

        Ok(())
    }

    #[test]
    fn allocated_price_at_base_drops_snapshot() -> TestResult {
        let mut item = item(250_000, 1)?;

        item.set_allocated_price(Money::from_minor(230_000, VND));
        item.set_allocated_price(Money::from_minor(250_000, VND));

        assert!(!item.is_discounted());
        assert_eq!(item.unit_price(), &Money::from_minor(250_000, VND));

        Ok(())
    }

    #[test]
    fn restore_returns_original_price() -> TestResult {
        let mut item = item(250_000, 1)?;

        item.set_allocated_price(Money::from_minor(1, VND));
        item.restore_original_price();

        assert_eq!(item.unit_price(), &Money::from_minor(250_000, VND));
        assert!(item.original_unit_price().is_none());

        Ok(())
    }
}
