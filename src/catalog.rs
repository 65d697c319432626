//! Catalog

use std::fmt;

use rusty_money::{Money, iso::Currency};

/// Catalog identifier of a sellable variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantId(String);

impl VariantId {
    /// Create a variant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is blank, i.e. the variant was never resolved.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VariantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A catalog unit offered for sale.
///
/// Variants are owned by the catalog service and never mutated here.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant<'a> {
    /// Variant identifier
    pub id: VariantId,

    /// Stock keeping unit, when the catalog provides one
    pub sku: Option<String>,

    /// Display name
    pub name: String,

    /// Catalog (list) price
    pub price: Money<'a, Currency>,

    /// Promotional price, when a catalog promotion is running
    pub discounted_price: Option<Money<'a, Currency>>,

    /// Units available
    pub stock: i64,
}

impl<'a> Variant<'a> {
    /// The price the variant currently sells for.
    ///
    /// This is the lower of the catalog price and an active promotional price. A promotional
    /// price of zero or less, or one in another currency, is treated as inactive.
    pub fn sale_price(&self) -> Money<'a, Currency> {
        match self.discounted_price {
            Some(promo)
                if promo.currency() == self.price.currency()
                    && promo.to_minor_units() > 0
                    && promo.to_minor_units() < self.price.to_minor_units() =>
            {
                promo
            }
            _ => self.price,
        }
    }

    /// Whether any stock is available.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
