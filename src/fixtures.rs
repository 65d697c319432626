//! Draft fixtures
//!
//! YAML files describing a draft order, used by the CLI and by tests. Amounts are whole minor
//! units of the fixture's currency.
//!
//! ```yaml
//! currency: VND
//! customer:
//!   id: c-1
//!   name: Nguyen Van A
//!   phone: "0901234567"
//!   points: 10
//! shipping_address: 12 Ly Thuong Kiet, Ha Noi
//! payment_method: CASH_ON_DELIVERY
//! items:
//!   - variant: v-1
//!     name: Linen shirt
//!     price: 300000
//!   - variant: v-2
//!     quantity: 2
//! voucher:
//!   code: SALE10
//!   kind: PERCENT
//!   value: 10
//!   cap: 80000
//! points_to_redeem: 3
//! ```
//!
//! Items without a `price` are left unresolved for the caller to price from the catalog.

use std::{fs, num::NonZeroU32, path::Path};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    catalog::VariantId,
    customers::{Customer, CustomerId, VipDiscount},
    draft::{DraftError, DraftOrder, PaymentMethod},
    items::LineItem,
    pricing::{PricingError, currency_from_code, percentage_from_points},
    vouchers::{UnknownVoucherKind, Voucher, VoucherKind, VoucherValue},
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Item quantities start at one
    #[error("Invalid quantity for variant {0}: quantities start at 1")]
    InvalidQuantity(String),

    /// Percentages must be within 0..=100
    #[error("Invalid percentage: {0}")]
    InvalidPercentage(Decimal),

    /// Unknown voucher kind
    #[error(transparent)]
    VoucherKind(#[from] UnknownVoucherKind),

    /// The fixture describes an invalid draft
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// Price arithmetic or currency error
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// A draft order fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftFixture {
    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Linked customer account
    #[serde(default)]
    pub customer: Option<CustomerFixture>,

    /// Contact name, when it differs from the customer account
    #[serde(default)]
    pub customer_name: Option<String>,

    /// Contact phone, when it differs from the customer account
    #[serde(default)]
    pub customer_phone: Option<String>,

    /// Shipping address
    #[serde(default)]
    pub shipping_address: String,

    /// Shipping fee in minor units
    #[serde(default)]
    pub shipping_fee: Option<i64>,

    /// Payment method
    #[serde(default)]
    pub payment_method: PaymentMethod,

    /// Notes
    #[serde(default)]
    pub notes: String,

    /// Line items
    #[serde(default)]
    pub items: Vec<ItemFixture>,

    /// Selected voucher
    #[serde(default)]
    pub voucher: Option<VoucherFixture>,

    /// Points to redeem
    #[serde(default)]
    pub points_to_redeem: u64,
}

fn default_currency() -> String {
    "VND".to_string()
}

/// A customer in a draft fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerFixture {
    /// Customer id
    pub id: String,

    /// Display name
    pub name: String,

    /// Phone
    #[serde(default)]
    pub phone: String,

    /// Loyalty-point balance
    #[serde(default)]
    pub points: u64,

    /// VIP discount in percent points, e.g. `5` for 5%
    #[serde(default)]
    pub vip_percent: Option<Decimal>,

    /// VIP discount as a flat amount in minor units
    #[serde(default)]
    pub vip_amount: Option<i64>,
}

/// A line item in a draft fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemFixture {
    /// Variant id
    pub variant: String,

    /// Display name; defaults to the variant id
    #[serde(default)]
    pub name: Option<String>,

    /// Unit price in minor units; unresolved when absent
    #[serde(default)]
    pub price: Option<i64>,

    /// Quantity
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// A voucher in a draft fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct VoucherFixture {
    /// Voucher code
    pub code: String,

    /// `PERCENT` or `FIXED`
    pub kind: String,

    /// Percent points for `PERCENT`, minor units for `FIXED`
    pub value: Decimal,

    /// Maximum discount in minor units
    #[serde(default)]
    pub cap: Option<i64>,

    /// Minimum order amount in minor units
    #[serde(default)]
    pub minimum: i64,
}

/// A fixture turned into a draft, with catalog lookups still outstanding.
#[derive(Debug)]
pub struct LoadedDraft {
    /// The draft, holding every priced item
    pub draft: DraftOrder<'static>,

    /// Items that still need pricing from the catalog
    pub unresolved: Vec<(VariantId, NonZeroU32)>,

    /// Voucher to select once every item is in the draft
    pub voucher: Option<Voucher<'static>>,

    /// Points to redeem once the customer is set
    pub points_to_redeem: u64,
}

impl LoadedDraft {
    /// Select the voucher and points, returning the finished draft.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Draft`] if the voucher cannot be used on the draft.
    pub fn finish(self) -> Result<DraftOrder<'static>, FixtureError> {
        let mut draft = self.draft;

        draft.set_points_to_redeem(self.points_to_redeem);

        if let Some(voucher) = self.voucher {
            draft.select_voucher(voucher)?;
        }

        Ok(draft)
    }
}

impl DraftFixture {
    /// Load a fixture from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::parse(&contents)
    }

    /// Parse a fixture from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Yaml`] if the text is not a valid fixture.
    pub fn parse(contents: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Build the draft described by this fixture.
    ///
    /// # Errors
    ///
    /// Returns an error if the currency, a quantity, a percentage or the voucher kind is
    /// invalid.
    pub fn into_draft(self) -> Result<LoadedDraft, FixtureError> {
        let currency = currency_from_code(&self.currency)
            .ok_or_else(|| FixtureError::UnknownCurrency(self.currency.clone()))?;

        let mut draft = DraftOrder::new(currency);
        let mut unresolved = Vec::new();

        if let Some(customer) = self.customer {
            draft.set_customer(Some(customer.into_customer(currency)?));
        }

        if self.customer_name.is_some() || self.customer_phone.is_some() {
            let name = self
                .customer_name
                .unwrap_or_else(|| draft.customer_name().to_string());
            let phone = self
                .customer_phone
                .unwrap_or_else(|| draft.customer_phone().to_string());

            draft.set_contact(name, phone);
        }

        draft.set_shipping_address(self.shipping_address);
        draft.set_shipping_fee(
            self.shipping_fee
                .map(|fee| Money::from_minor(fee, currency)),
        )?;
        draft.set_payment_method(self.payment_method);
        draft.set_notes(self.notes);

        for item in self.items {
            let quantity = NonZeroU32::new(item.quantity)
                .ok_or_else(|| FixtureError::InvalidQuantity(item.variant.clone()))?;

            match item.price {
                Some(price) => {
                    let name = item.name.unwrap_or_else(|| item.variant.clone());

                    draft.add_item(LineItem::new(
                        VariantId::new(item.variant),
                        name,
                        quantity,
                        Money::from_minor(price, currency),
                    ))?;
                }
                None => unresolved.push((VariantId::new(item.variant), quantity)),
            }
        }

        let voucher = self
            .voucher
            .map(|voucher| voucher.into_voucher(currency))
            .transpose()?;

        Ok(LoadedDraft {
            draft,
            unresolved,
            voucher,
            points_to_redeem: self.points_to_redeem,
        })
    }
}

impl CustomerFixture {
    fn into_customer(self, currency: &'static Currency) -> Result<Customer<'static>, FixtureError> {
        let vip = match (self.vip_percent, self.vip_amount) {
            (Some(percent), _) => VipDiscount::Percentage(
                percentage_from_points(percent).ok_or(FixtureError::InvalidPercentage(percent))?,
            ),
            (None, Some(amount)) => VipDiscount::Amount(Money::from_minor(amount, currency)),
            (None, None) => VipDiscount::None,
        };

        Ok(Customer {
            id: CustomerId::new(self.id),
            name: self.name,
            phone: self.phone,
            point_balance: self.points,
            vip,
        })
    }
}

impl VoucherFixture {
    fn into_voucher(self, currency: &'static Currency) -> Result<Voucher<'static>, FixtureError> {
        let value = match self.kind.parse::<VoucherKind>()? {
            VoucherKind::Percent => VoucherValue::Percent {
                percent: percentage_from_points(self.value)
                    .ok_or(FixtureError::InvalidPercentage(self.value))?,
                cap: self.cap.map(|cap| Money::from_minor(cap, currency)),
            },
            VoucherKind::Fixed => {
                let minor = self.value.trunc().to_i64().ok_or(PricingError::Overflow)?;

                VoucherValue::Fixed(Money::from_minor(minor, currency))
            }
        };

        Ok(Voucher {
            code: self.code,
            value,
            minimum_order_amount: Money::from_minor(self.minimum, currency),
        })
    }
}
