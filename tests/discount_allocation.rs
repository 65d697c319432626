//! Voucher allocation across a draft's line items.
//!
//! With `uneven_split.yaml`, the 79,000 VND voucher is spread over 800,000 VND of goods:
//!
//! - socks: 3 × 100,000, share 79,000 × 300,000 / 800,000 = 29,625, 9,875 per unit
//! - tote: 1 × 500,000, share 79,000 × 500,000 / 800,000 = 49,375

use std::{num::NonZeroU32, path::PathBuf};

use rusty_money::{
    Money,
    iso::{Currency, VND},
};
use testresult::TestResult;

use orderly::{
    allocation::allocate_discount,
    catalog::VariantId,
    draft::DraftOrder,
    fixtures::DraftFixture,
    items::LineItem,
};

fn vnd(minor: i64) -> Money<'static, Currency> {
    Money::from_minor(minor, VND)
}

fn load(name: &str) -> Result<DraftOrder<'static>, Box<dyn std::error::Error>> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/drafts")
        .join(format!("{name}.yaml"));

    Ok(DraftFixture::load(path)?.into_draft()?.finish()?)
}

fn unit_price_of(draft: &DraftOrder<'static>, variant: &str) -> Option<Money<'static, Currency>> {
    draft
        .items()
        .find(|(_key, item)| item.variant_id().as_str() == variant)
        .map(|(_key, item)| *item.unit_price())
}

/// Total reduction shown on the items, in minor units.
fn shown_reduction(draft: &DraftOrder<'static>) -> i64 {
    draft
        .items()
        .map(|(_key, item)| {
            (item.base_unit_price().to_minor_units() - item.unit_price().to_minor_units())
                * i64::from(item.quantity().get())
        })
        .sum()
}

#[test]
fn voucher_is_spread_in_proportion() -> TestResult {
    let draft = load("uneven_split")?;

    assert_eq!(unit_price_of(&draft, "v-10"), Some(vnd(90_125)));
    assert_eq!(unit_price_of(&draft, "v-11"), Some(vnd(450_625)));
    assert_eq!(shown_reduction(&draft), 79_000);

    Ok(())
}

#[test]
fn reduction_stays_within_one_minor_unit_per_unit_sold() -> TestResult {
    let quantities = [1_u32, 2, 3, 7, 13];
    let prices = [99_999_i64, 12_345, 3, 250_000, 1_001];

    for discount in [1_i64, 7, 79_000, 123_457, 500_000] {
        let mut items = quantities
            .iter()
            .zip(prices)
            .enumerate()
            .map(|(idx, (&quantity, price))| {
                let quantity = NonZeroU32::new(quantity).ok_or("zero quantity")?;

                Ok(LineItem::new(
                    VariantId::new(format!("v-{idx}")),
                    format!("Item {idx}"),
                    quantity,
                    vnd(price),
                ))
            })
            .collect::<Result<Vec<_>, &str>>()?;

        let allocation = allocate_discount(items.iter_mut(), &vnd(discount))?;

        let units: i64 = quantities.iter().map(|&quantity| i64::from(quantity)).sum();
        let allocated = allocation.allocated().to_minor_units();

        assert!(
            allocated <= discount && allocated >= discount - units,
            "allocated {allocated} of {discount} across {units} units"
        );

        for item in &items {
            assert!(
                item.original_unit_price()
                    .is_none_or(|original| original.to_minor_units() >= item.unit_price().to_minor_units()),
                "original below discounted price for {}",
                item.name()
            );
        }
    }

    Ok(())
}

#[test]
fn flooring_per_unit_can_lose_up_to_one_unit_each() -> TestResult {
    let mut items = [LineItem::new(
        VariantId::new("v-1"),
        "Pencil",
        NonZeroU32::new(3).ok_or("zero")?,
        vnd(100),
    )];

    let allocation = allocate_discount(items.iter_mut(), &vnd(2))?;

    // 2 / 3 per unit floors to nothing: the whole discount is lost, within 3 units sold
    assert_eq!(allocation.allocated(), vnd(0));
    assert_eq!(allocation.shortfall(), vnd(2));
    assert!(items.iter().all(|item| item.unit_price() == &vnd(100)), "prices unchanged");

    Ok(())
}

#[test]
fn clearing_the_voucher_restores_prices() -> TestResult {
    let mut draft = load("uneven_split")?;

    let voucher = draft.clear_voucher();

    assert!(voucher.is_some(), "fixture selects a voucher");
    assert_eq!(unit_price_of(&draft, "v-10"), Some(vnd(100_000)));
    assert_eq!(unit_price_of(&draft, "v-11"), Some(vnd(500_000)));
    assert!(
        draft.items().all(|(_key, item)| item.original_unit_price().is_none()),
        "no item may keep an original price after clearing"
    );

    Ok(())
}

#[test]
fn allocation_follows_quantity_changes() -> TestResult {
    let mut draft = load("uneven_split")?;

    let socks = draft
        .items()
        .find(|(_key, item)| item.variant_id().as_str() == "v-10")
        .map(|(key, _item)| key)
        .ok_or("socks missing")?;

    draft.set_quantity(socks, NonZeroU32::new(5).ok_or("zero")?)?;

    // 79,000 over 1,000,000: socks 7,900 per unit, tote 39,500
    assert_eq!(unit_price_of(&draft, "v-10"), Some(vnd(92_100)));
    assert_eq!(unit_price_of(&draft, "v-11"), Some(vnd(460_500)));
    assert_eq!(shown_reduction(&draft), 79_000);

    Ok(())
}
