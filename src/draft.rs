//! Draft orders
//!
//! A [`DraftOrder`] is the order being composed before submission. It is a plain value: the
//! caller owns the only mutable reference and every edit goes through a method here, so the
//! voucher allocation shown on the line items is always in step with the basket.

use std::{fmt, num::NonZeroU32, str::FromStr};

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    allocation::{Allocation, AllocationError, allocate_discount, clear_allocation},
    customers::Customer,
    items::{LineItem, LineItemKey},
    loyalty::clamp_redeemable,
    pricing::{PricingError, checked_sum, ensure_currency},
    vouchers::{Voucher, VoucherError},
};

/// Errors raised while editing a draft order.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The line item key does not belong to this draft.
    #[error("line item {0:?} is not part of this draft")]
    UnknownItem(LineItemKey),

    /// Adding to an existing row would overflow its quantity.
    #[error("quantity overflow for variant {0}")]
    QuantityOverflow(String),

    /// Wrapped price arithmetic or currency mismatch error.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Wrapped allocation error.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The selected voucher cannot be used.
    #[error(transparent)]
    Voucher(#[from] VoucherError),
}

/// Identity of a draft, used to keep submissions single-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftId(Uuid);

impl DraftId {
    /// Generate a fresh draft id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the counter
    #[default]
    Cash,

    /// Bank transfer
    BankTransfer,

    /// Card payment
    Card,

    /// Cash collected on delivery
    CashOnDelivery,
}

impl PaymentMethod {
    /// Backend encoding of the payment method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Card => "CARD",
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
        }
    }
}

/// Unrecognised payment method.
#[derive(Debug, Error, PartialEq)]
#[error("unknown payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "CASH" => Ok(PaymentMethod::Cash),
            "BANK_TRANSFER" | "TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "CARD" => Ok(PaymentMethod::Card),
            "CASH_ON_DELIVERY" | "COD" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(UnknownPaymentMethod(other.to_string())),
        }
    }
}

/// An order being composed.
#[derive(Debug, Clone)]
pub struct DraftOrder<'a> {
    id: DraftId,
    currency: &'a Currency,
    customer: Option<Customer<'a>>,
    customer_name: String,
    customer_phone: String,
    shipping_address: String,
    items: SlotMap<LineItemKey, LineItem<'a>>,
    voucher: Option<Voucher<'a>>,
    points_to_redeem: u64,
    shipping_fee: Option<Money<'a, Currency>>,
    payment_method: PaymentMethod,
    notes: String,
}

impl<'a> DraftOrder<'a> {
    /// Create an empty draft priced in `currency`.
    pub fn new(currency: &'a Currency) -> Self {
        Self::with_id(DraftId::new(), currency)
    }

    /// Create an empty draft with a known id.
    pub fn with_id(id: DraftId, currency: &'a Currency) -> Self {
        Self {
            id,
            currency,
            customer: None,
            customer_name: String::new(),
            customer_phone: String::new(),
            shipping_address: String::new(),
            items: SlotMap::with_key(),
            voucher: None,
            points_to_redeem: 0,
            shipping_fee: None,
            payment_method: PaymentMethod::default(),
            notes: String::new(),
        }
    }

    /// Draft identity
    pub fn id(&self) -> DraftId {
        self.id
    }

    /// Currency every price in the draft is in
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Linked customer account; `None` for a walk-in
    pub fn customer(&self) -> Option<&Customer<'a>> {
        self.customer.as_ref()
    }

    /// Contact name on the order
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    /// Contact phone on the order
    pub fn customer_phone(&self) -> &str {
        &self.customer_phone
    }

    /// Shipping address
    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    /// Selected voucher
    pub fn voucher(&self) -> Option<&Voucher<'a>> {
        self.voucher.as_ref()
    }

    /// Loyalty points the customer wants to redeem, already clamped to their balance
    pub fn points_to_redeem(&self) -> u64 {
        self.points_to_redeem
    }

    /// Shipping fee, once known
    pub fn shipping_fee(&self) -> Option<Money<'a, Currency>> {
        self.shipping_fee
    }

    /// Payment method
    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Free-text notes
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Iterate over the line items.
    pub fn items(&self) -> impl Iterator<Item = (LineItemKey, &LineItem<'a>)> {
        self.items.iter()
    }

    /// Look up a single line item.
    pub fn item(&self, key: LineItemKey) -> Option<&LineItem<'a>> {
        self.items.get(key)
    }

    /// Number of line items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the draft has no line items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Undiscounted subtotal of the draft.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the subtotal does not fit in minor units.
    pub fn subtotal(&self) -> Result<Money<'a, Currency>, PricingError> {
        let minor = checked_sum(
            self.items
                .values()
                .map(|item| item.base_line_total().map(|total| total.to_minor_units()))
                .collect::<Result<Vec<_>, _>>()?,
        )?;

        Ok(Money::from_minor(minor, self.currency))
    }

    /// Voucher discount on the current subtotal; zero without a voucher.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the subtotal or voucher cannot be evaluated.
    pub fn voucher_discount(&self) -> Result<Money<'a, Currency>, PricingError> {
        let subtotal = self.subtotal()?;

        match &self.voucher {
            Some(voucher) => voucher.discount_for(&subtotal),
            None => Ok(Money::from_minor(0, self.currency)),
        }
    }

    /// Add an item, merging it into an existing row for the same variant.
    ///
    /// # Errors
    ///
    /// - [`DraftError::Pricing`]: the item is priced in another currency.
    /// - [`DraftError::QuantityOverflow`]: merging overflows the row quantity.
    pub fn add_item(&mut self, item: LineItem<'a>) -> Result<LineItemKey, DraftError> {
        ensure_currency(item.base_unit_price(), self.currency)?;

        let existing = self
            .items
            .iter()
            .find(|(_, row)| row.variant_id() == item.variant_id())
            .map(|(key, _)| key);

        let key = if let Some(key) = existing {
            let row = self.items.get_mut(key).ok_or(DraftError::UnknownItem(key))?;
            let quantity = row
                .quantity()
                .checked_add(item.quantity().get())
                .ok_or_else(|| DraftError::QuantityOverflow(item.variant_id().to_string()))?;

            row.set_quantity(quantity);
            key
        } else {
            let mut item = item;
            item.restore_original_price();
            self.items.insert(item)
        };

        self.reallocate()?;

        Ok(key)
    }

    /// Change the quantity of a row.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::UnknownItem`] if the key is not part of this draft.
    pub fn set_quantity(
        &mut self,
        key: LineItemKey,
        quantity: NonZeroU32,
    ) -> Result<(), DraftError> {
        self.items
            .get_mut(key)
            .ok_or(DraftError::UnknownItem(key))?
            .set_quantity(quantity);

        self.reallocate()?;

        Ok(())
    }

    /// Remove a row, returning it at its undiscounted price.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError::UnknownItem`] if the key is not part of this draft.
    pub fn remove_item(&mut self, key: LineItemKey) -> Result<LineItem<'a>, DraftError> {
        let mut item = self.items.remove(key).ok_or(DraftError::UnknownItem(key))?;

        item.restore_original_price();

        self.reallocate()?;

        Ok(item)
    }

    /// Link a customer account, or `None` for a walk-in.
    ///
    /// The contact fields are filled from the account, and the points to redeem are clamped
    /// to the new balance.
    pub fn set_customer(&mut self, customer: Option<Customer<'a>>) {
        if let Some(customer) = &customer {
            self.customer_name.clone_from(&customer.name);
            self.customer_phone.clone_from(&customer.phone);
        }

        self.customer = customer;
        self.points_to_redeem = clamp_redeemable(self.points_to_redeem, self.point_balance());
    }

    /// Set the contact name and phone.
    pub fn set_contact(&mut self, name: impl Into<String>, phone: impl Into<String>) {
        self.customer_name = name.into();
        self.customer_phone = phone.into();
    }

    /// Set the shipping address.
    pub fn set_shipping_address(&mut self, address: impl Into<String>) {
        self.shipping_address = address.into();
    }

    /// Set the shipping fee, or `None` while it is not known yet.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::CurrencyMismatch`] if the fee is in another currency.
    pub fn set_shipping_fee(&mut self, fee: Option<Money<'a, Currency>>) -> Result<(), PricingError> {
        if let Some(fee) = &fee {
            ensure_currency(fee, self.currency)?;
        }

        self.shipping_fee = fee;

        Ok(())
    }

    /// Set the payment method.
    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    /// Set the notes.
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Request loyalty points to redeem, returning the amount kept after clamping to the
    /// customer's balance. Walk-in orders have no balance.
    pub fn set_points_to_redeem(&mut self, points: u64) -> u64 {
        self.points_to_redeem = clamp_redeemable(points, self.point_balance());
        self.points_to_redeem
    }

    /// Select a voucher and spread its discount over the line items.
    ///
    /// # Errors
    ///
    /// - [`DraftError::Voucher`]: the subtotal is below the voucher's minimum order amount.
    /// - [`DraftError::Allocation`] / [`DraftError::Pricing`]: the discount cannot be spread.
    pub fn select_voucher(&mut self, voucher: Voucher<'a>) -> Result<Allocation<'a>, DraftError> {
        let subtotal = self.subtotal()?;

        voucher.check_eligible(&subtotal)?;

        let discount = voucher.discount_for(&subtotal)?;

        let allocation = match allocate_discount(self.items.values_mut(), &discount) {
            Ok(allocation) => allocation,
            Err(error) => {
                // put back whatever the previous selection showed
                self.reallocate()?;
                return Err(error.into());
            }
        };

        self.voucher = Some(voucher);

        Ok(allocation)
    }

    /// Drop the voucher and restore every line item's undiscounted price.
    pub fn clear_voucher(&mut self) -> Option<Voucher<'a>> {
        clear_allocation(self.items.values_mut());

        self.voucher.take()
    }

    fn point_balance(&self) -> u64 {
        self.customer
            .as_ref()
            .map_or(0, |customer| customer.point_balance)
    }

    fn reallocate(&mut self) -> Result<(), DraftError> {
        if self.voucher.is_some() {
            let discount = self.voucher_discount()?;

            allocate_discount(self.items.values_mut(), &discount)?;
        } else {
            clear_allocation(self.items.values_mut());
        }

        Ok(())
    }
}
