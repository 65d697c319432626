//! Wire formats
//!
//! The backend is not consistent about its JSON: ids arrive as numbers or strings, amounts as
//! integers, floats or strings, field names vary between endpoints and some responses are
//! wrapped in `{"data": ...}`. Everything inbound is absorbed here and converted into the
//! domain types; nothing outside this module sees a wire shape.
//!
//! Amounts on the wire, in both directions, are whole minor units of the working currency.

use std::str::FromStr;

use jiff::{Timestamp, civil, tz::TimeZone};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    catalog::{Variant, VariantId},
    customers::{Customer, CustomerId, VipDiscount},
    draft::PaymentMethod,
    fulfillment::OrderStatus,
    items::LineItem,
    orders::{Order, OrderId},
    pricing::percentage_from_points,
    summary::CheckoutSummary,
    vouchers::{Voucher, VoucherApplication, VoucherKind, VoucherValue},
};

use super::ApiError;

/// An identifier that may be sent as a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Number(id) => id.to_string(),
            WireId::Text(id) => id,
        }
    }
}

/// A number that may be sent as an integer, a float or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl WireNumber {
    fn to_decimal(&self) -> Result<Decimal, ApiError> {
        match self {
            WireNumber::Integer(value) => Ok(Decimal::from(*value)),
            WireNumber::Float(value) => Decimal::from_f64(*value)
                .ok_or_else(|| ApiError::Decode(format!("number {value} is not finite"))),
            WireNumber::Text(value) => Decimal::from_str(value.trim())
                .map_err(|error| ApiError::Decode(format!("invalid number {value:?}: {error}"))),
        }
    }

    fn to_whole(&self) -> Result<i64, ApiError> {
        let value = self.to_decimal()?;

        if !value.fract().is_zero() {
            return Err(ApiError::Decode(format!(
                "amount {value} is not a whole number of minor units"
            )));
        }

        value
            .to_i64()
            .ok_or_else(|| ApiError::Decode(format!("amount {value} is out of range")))
    }

    fn to_count(&self) -> Result<u64, ApiError> {
        Ok(u64::try_from(self.to_whole()?.max(0)).unwrap_or_default())
    }

    fn to_money(&self, currency: &'static Currency) -> Result<Money<'static, Currency>, ApiError> {
        Ok(Money::from_minor(self.to_whole()?, currency))
    }
}

fn money_or_zero(
    amount: Option<&WireNumber>,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, ApiError> {
    amount.map_or_else(
        || Ok(Money::from_minor(0, currency)),
        |amount| amount.to_money(currency),
    )
}

/// A single payload, optionally wrapped in `{"data": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } | Envelope::Bare(data) => data,
        }
    }
}

/// A list payload: bare, wrapped in `{"data": [...]}` or paged as `{"items": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireList<T> {
    Wrapped {
        data: Vec<T>,
    },
    Paged {
        #[serde(alias = "content", alias = "results")]
        items: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> WireList<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            WireList::Wrapped { data } => data,
            WireList::Paged { items } => items,
            WireList::Bare(items) => items,
        }
    }
}

/// A lookup that may answer with one match or a list of matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVariant {
    #[serde(alias = "variantId")]
    id: WireId,

    #[serde(default)]
    sku: Option<String>,

    #[serde(alias = "variantName", alias = "productName", alias = "title")]
    name: String,

    #[serde(alias = "basePrice", alias = "originalPrice")]
    price: WireNumber,

    #[serde(default, alias = "salePrice", alias = "promotionPrice")]
    discounted_price: Option<WireNumber>,

    #[serde(default, alias = "quantity", alias = "stockQuantity", alias = "availableStock")]
    stock: Option<WireNumber>,
}

impl WireVariant {
    pub(crate) fn into_variant(
        self,
        currency: &'static Currency,
    ) -> Result<Variant<'static>, ApiError> {
        Ok(Variant {
            id: VariantId::new(self.id.into_string()),
            sku: self.sku,
            name: self.name,
            price: self.price.to_money(currency)?,
            discounted_price: self
                .discounted_price
                .map(|price| price.to_money(currency))
                .transpose()?,
            stock: self.stock.map(|stock| stock.to_whole()).transpose()?.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCustomer {
    #[serde(alias = "customerId")]
    id: WireId,

    #[serde(alias = "fullName", alias = "customerName")]
    name: String,

    #[serde(default, alias = "phoneNumber")]
    phone: String,

    #[serde(default, alias = "points", alias = "loyaltyPoints", alias = "rewardPoints")]
    point_balance: Option<WireNumber>,

    #[serde(default, alias = "vipPercent", alias = "vipDiscountRate")]
    vip_discount_percent: Option<WireNumber>,

    #[serde(default, alias = "vipAmount")]
    vip_discount_amount: Option<WireNumber>,
}

impl WireCustomer {
    pub(crate) fn into_customer(
        self,
        currency: &'static Currency,
    ) -> Result<Customer<'static>, ApiError> {
        let vip = match (&self.vip_discount_percent, &self.vip_discount_amount) {
            (Some(percent), _) => {
                let points = percent.to_decimal()?;

                VipDiscount::Percentage(percentage_from_points(points).ok_or_else(|| {
                    ApiError::Decode(format!("VIP percentage {points} is out of range"))
                })?)
            }
            (None, Some(amount)) => VipDiscount::Amount(amount.to_money(currency)?),
            (None, None) => VipDiscount::None,
        };

        Ok(Customer {
            id: CustomerId::new(self.id.into_string()),
            name: self.name,
            phone: self.phone,
            point_balance: self
                .point_balance
                .map(|points| points.to_count())
                .transpose()?
                .unwrap_or(0),
            vip,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVoucher {
    #[serde(alias = "voucherCode")]
    code: String,

    #[serde(alias = "type", alias = "discountType")]
    kind: String,

    #[serde(alias = "discountValue")]
    value: WireNumber,

    #[serde(default, alias = "maxDiscount", alias = "maximumDiscount", alias = "maxDiscountAmount")]
    cap: Option<WireNumber>,

    #[serde(default, alias = "minOrderAmount", alias = "minimumOrderValue")]
    minimum_order_amount: Option<WireNumber>,
}

impl WireVoucher {
    pub(crate) fn into_voucher(
        self,
        currency: &'static Currency,
    ) -> Result<Voucher<'static>, ApiError> {
        let kind = self
            .kind
            .parse::<VoucherKind>()
            .map_err(|error| ApiError::Decode(error.to_string()))?;

        let value = match kind {
            VoucherKind::Percent => {
                let points = self.value.to_decimal()?;

                VoucherValue::Percent {
                    percent: percentage_from_points(points).ok_or_else(|| {
                        ApiError::Decode(format!(
                            "voucher {} has out of range percentage {points}",
                            self.code
                        ))
                    })?,
                    cap: self.cap.map(|cap| cap.to_money(currency)).transpose()?,
                }
            }
            VoucherKind::Fixed => VoucherValue::Fixed(self.value.to_money(currency)?),
        };

        Ok(Voucher {
            minimum_order_amount: money_or_zero(self.minimum_order_amount.as_ref(), currency)?,
            code: self.code,
            value,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVoucherApplication {
    #[serde(default, alias = "valid", alias = "isValid")]
    success: bool,

    #[serde(default, alias = "discount")]
    discount_amount: Option<WireNumber>,

    #[serde(default, alias = "reason", alias = "error")]
    message: Option<String>,
}

impl WireVoucherApplication {
    pub(crate) fn into_application(
        self,
        currency: &'static Currency,
    ) -> Result<VoucherApplication<'static>, ApiError> {
        Ok(VoucherApplication {
            success: self.success,
            discount_amount: money_or_zero(self.discount_amount.as_ref(), currency)?,
            message: self.message,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSummary {
    subtotal: WireNumber,

    #[serde(default)]
    voucher_discount: Option<WireNumber>,

    #[serde(default, alias = "pointsRedeemed")]
    points_used: Option<WireNumber>,

    #[serde(default, alias = "pointDiscount")]
    points_discount: Option<WireNumber>,

    #[serde(default, alias = "vipDiscountAmount")]
    vip_discount: Option<WireNumber>,

    #[serde(default, alias = "shippingFeeAmount")]
    shipping_fee: Option<WireNumber>,

    #[serde(alias = "total", alias = "finalTotal")]
    grand_total: WireNumber,

    #[serde(default, alias = "earnedPoints", alias = "loyaltyPointsEarned")]
    points_earned: Option<WireNumber>,
}

impl WireSummary {
    pub(crate) fn into_summary(
        self,
        currency: &'static Currency,
    ) -> Result<CheckoutSummary<'static>, ApiError> {
        Ok(CheckoutSummary {
            subtotal: self.subtotal.to_money(currency)?,
            voucher_discount: money_or_zero(self.voucher_discount.as_ref(), currency)?,
            points_redeemed: self
                .points_used
                .map(|points| points.to_count())
                .transpose()?
                .unwrap_or(0),
            points_discount: money_or_zero(self.points_discount.as_ref(), currency)?,
            vip_discount: money_or_zero(self.vip_discount.as_ref(), currency)?,
            shipping_fee: self
                .shipping_fee
                .map(|fee| fee.to_money(currency))
                .transpose()?,
            grand_total: self.grand_total.to_money(currency)?,
            points_earned: self
                .points_earned
                .map(|points| points.to_count())
                .transpose()?
                .unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireOrder {
    #[serde(alias = "orderId")]
    id: WireId,

    #[serde(alias = "orderStatus")]
    status: String,

    #[serde(default, alias = "total", alias = "totalAmount")]
    grand_total: Option<WireNumber>,

    #[serde(default, alias = "voucherDiscountAmount")]
    voucher_discount: Option<WireNumber>,

    #[serde(default, alias = "pointDiscount")]
    points_discount: Option<WireNumber>,

    #[serde(default, alias = "vipDiscountAmount")]
    vip_discount: Option<WireNumber>,

    #[serde(default)]
    created_at: Option<serde_json::Value>,
}

impl WireOrder {
    /// Only the id and status are required; an order the backend has already stored is never
    /// rejected over an amount or timestamp it reports in an unexpected shape.
    pub(crate) fn into_order(self, currency: &'static Currency) -> Result<Order<'static>, ApiError> {
        let id = OrderId::new(self.id.into_string());
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|error| ApiError::Decode(error.to_string()))?;

        let created_at = self.created_at.and_then(|raw| {
            let parsed = raw.as_str().and_then(parse_timestamp);

            if parsed.is_none() && !raw.is_null() {
                warn!(order_id = %id, created_at = %raw, "ignoring unreadable order timestamp");
            }

            parsed
        });

        Ok(Order {
            grand_total: lenient_money(&id, "grand_total", self.grand_total, currency),
            voucher_discount: lenient_money(&id, "voucher_discount", self.voucher_discount, currency),
            points_discount: lenient_money(&id, "points_discount", self.points_discount, currency),
            vip_discount: lenient_money(&id, "vip_discount", self.vip_discount, currency),
            created_at,
            id,
            status,
        })
    }
}

fn lenient_money(
    id: &OrderId,
    field: &'static str,
    amount: Option<WireNumber>,
    currency: &'static Currency,
) -> Option<Money<'static, Currency>> {
    amount?
        .to_money(currency)
        .inspect_err(|error| warn!(order_id = %id, field, %error, "ignoring unreadable order amount"))
        .ok()
}

/// Parse an RFC 3339 timestamp, reading a date-time without an offset as UTC.
fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();

    raw.parse::<Timestamp>().ok().or_else(|| {
        raw.parse::<civil::DateTime>()
            .ok()
            .and_then(|datetime| datetime.to_zoned(TimeZone::UTC).ok())
            .map(|zoned| zoned.timestamp())
    })
}

/// One order row as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Catalog variant
    pub variant_id: String,

    /// Units ordered
    pub quantity: u32,

    /// Undiscounted unit price, in minor units
    pub unit_price: i64,
}

impl From<&LineItem<'_>> for OrderLine {
    fn from(item: &LineItem<'_>) -> Self {
        Self {
            variant_id: item.variant_id().to_string(),
            quantity: item.quantity().get(),
            unit_price: item.base_unit_price().to_minor_units(),
        }
    }
}

/// Body of a server-side checkout summary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Order rows
    pub line_items: Vec<OrderLine>,

    /// Linked customer, absent for walk-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    /// Loyalty points to redeem
    pub points_used: u64,

    /// Selected voucher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,

    /// Shipping fee in minor units, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_fee: Option<i64>,
}

/// Body of an order creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Linked customer, absent for walk-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    /// Contact name
    pub customer_name: String,

    /// Contact phone
    pub customer_phone: String,

    /// Shipping address
    pub shipping_address: String,

    /// Order rows
    pub line_items: Vec<OrderLine>,

    /// Selected voucher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,

    /// Loyalty points redeemed
    pub points_used: u64,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Free-text notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Undiscounted subtotal
    pub subtotal: i64,

    /// Voucher discount
    pub voucher_discount: i64,

    /// Loyalty points discount
    pub points_discount: i64,

    /// VIP discount
    pub vip_discount: i64,

    /// Shipping fee, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_fee: Option<i64>,

    /// Amount payable
    pub grand_total: i64,
}

/// Body of a voucher application request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplyVoucherRequest<'r> {
    pub(crate) customer_id: &'r str,
    pub(crate) code: &'r str,
    pub(crate) order_amount: i64,
}

/// Body of a status update request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusUpdate {
    pub(crate) status: OrderStatus,
}
