//! Orders

use std::fmt;

use jiff::Timestamp;
use rusty_money::{Money, iso::Currency};

use crate::fulfillment::OrderStatus;

/// Backend identifier of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(String);

impl OrderId {
    /// Create an order id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A persisted order, as returned by the order service.
#[derive(Debug, Clone, PartialEq)]
pub struct Order<'a> {
    /// Order identifier
    pub id: OrderId,

    /// Current fulfillment status
    pub status: OrderStatus,

    /// Grand total the order was settled at, when the backend reports it
    pub grand_total: Option<Money<'a, Currency>>,

    /// Voucher discount recorded on the order
    pub voucher_discount: Option<Money<'a, Currency>>,

    /// Loyalty-point discount recorded on the order
    pub points_discount: Option<Money<'a, Currency>>,

    /// VIP discount recorded on the order
    pub vip_discount: Option<Money<'a, Currency>>,

    /// Creation time, when the backend reports it
    pub created_at: Option<Timestamp>,
}

impl Order<'_> {
    /// An order known only by id and status.
    pub fn new(id: OrderId, status: OrderStatus) -> Self {
        Self {
            id,
            status,
            grand_total: None,
            voucher_discount: None,
            points_discount: None,
            vip_discount: None,
            created_at: None,
        }
    }
}
