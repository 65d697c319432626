//! Vouchers
//!
//! Order-level promotional codes. Eligibility is decided by the voucher service; this module
//! only turns an eligible voucher into a discount amount against a subtotal.

use std::{fmt, str::FromStr};

use decimal_percentage::Percentage;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    api::{ApiError, VouchersApi},
    customers::CustomerId,
    pricing::{PricingError, ensure_currency, percent_of_minor_floor},
};

/// Errors raised while checking or applying a voucher.
#[derive(Debug, Error)]
pub enum VoucherError {
    /// The voucher cannot be used on this order; `reason` is shown to the user as-is.
    #[error("voucher {code} is not valid for this order: {reason}")]
    Invalid {
        /// Voucher code
        code: String,

        /// Human-readable reason
        reason: String,
    },

    /// Voucher arithmetic failed.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Talking to the voucher service failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The two kinds of voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherKind {
    /// Percentage of the subtotal, optionally capped
    Percent,

    /// Flat amount
    Fixed,
}

impl fmt::Display for VoucherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoucherKind::Percent => f.write_str("PERCENT"),
            VoucherKind::Fixed => f.write_str("FIXED"),
        }
    }
}

/// Unrecognised voucher kind.
#[derive(Debug, Error, PartialEq)]
#[error("unknown voucher kind: {0}")]
pub struct UnknownVoucherKind(pub String);

impl FromStr for VoucherKind {
    type Err = UnknownVoucherKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PERCENT" | "PERCENTAGE" | "PERCENT_OFF" => Ok(VoucherKind::Percent),
            "FIXED" | "AMOUNT" | "FIXED_AMOUNT" | "AMOUNT_OFF" => Ok(VoucherKind::Fixed),
            other => Err(UnknownVoucherKind(other.to_string())),
        }
    }
}

/// What a voucher takes off the order.
#[derive(Debug, Clone, Copy)]
pub enum VoucherValue<'a> {
    /// Percentage of the subtotal, never more than `cap` when one is set
    Percent {
        /// Percentage off
        percent: Percentage,

        /// Maximum discount
        cap: Option<Money<'a, Currency>>,
    },

    /// Flat amount off
    Fixed(Money<'a, Currency>),
}

/// A voucher supplied by the eligibility service.
#[derive(Debug, Clone)]
pub struct Voucher<'a> {
    /// Voucher code
    pub code: String,

    /// Discount value
    pub value: VoucherValue<'a>,

    /// Minimum undiscounted subtotal the voucher needs
    pub minimum_order_amount: Money<'a, Currency>,
}

impl<'a> Voucher<'a> {
    /// The voucher kind.
    pub fn kind(&self) -> VoucherKind {
        match self.value {
            VoucherValue::Percent { .. } => VoucherKind::Percent,
            VoucherValue::Fixed(_) => VoucherKind::Fixed,
        }
    }

    /// Whether `subtotal` meets the minimum order amount.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the subtotal is in another currency.
    pub fn is_eligible(&self, subtotal: &Money<'a, Currency>) -> Result<bool, PricingError> {
        ensure_currency(&self.minimum_order_amount, subtotal.currency())?;

        Ok(subtotal.to_minor_units() >= self.minimum_order_amount.to_minor_units())
    }

    /// Check the voucher against `subtotal`, reporting why it cannot be used.
    ///
    /// # Errors
    ///
    /// - [`VoucherError::Invalid`]: the subtotal is below the minimum order amount.
    /// - [`VoucherError::Pricing`]: the subtotal is in another currency.
    pub fn check_eligible(&self, subtotal: &Money<'a, Currency>) -> Result<(), VoucherError> {
        if self.is_eligible(subtotal)? {
            Ok(())
        } else {
            Err(VoucherError::Invalid {
                code: self.code.clone(),
                reason: format!(
                    "order amount {subtotal} is below the minimum of {}",
                    self.minimum_order_amount
                ),
            })
        }
    }

    /// Discount this voucher grants on `subtotal`.
    ///
    /// Zero when the subtotal is below the minimum order amount. Percentage vouchers are
    /// truncated to the minor unit before the cap applies.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] on currency mismatch or percentage overflow.
    pub fn discount_for(
        &self,
        subtotal: &Money<'a, Currency>,
    ) -> Result<Money<'a, Currency>, PricingError> {
        let currency = subtotal.currency();

        if !self.is_eligible(subtotal)? {
            return Ok(Money::from_minor(0, currency));
        }

        let minor = match &self.value {
            VoucherValue::Percent { percent, cap } => {
                let amount = percent_of_minor_floor(percent, subtotal.to_minor_units())?;

                match cap {
                    Some(cap) => {
                        ensure_currency(cap, currency)?;
                        amount.min(cap.to_minor_units())
                    }
                    None => amount,
                }
            }
            VoucherValue::Fixed(amount) => {
                ensure_currency(amount, currency)?;
                amount.to_minor_units()
            }
        };

        Ok(Money::from_minor(minor.max(0), currency))
    }
}

/// Server verdict on applying a voucher to an order.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherApplication<'a> {
    /// Whether the voucher was accepted
    pub success: bool,

    /// Discount the server granted
    pub discount_amount: Money<'a, Currency>,

    /// Human-readable explanation
    pub message: Option<String>,
}

impl<'a> VoucherApplication<'a> {
    /// Turn the verdict into the granted discount, or the server's rejection reason.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::Invalid`] when the server rejected the voucher.
    pub fn into_discount(self, code: &str) -> Result<Money<'a, Currency>, VoucherError> {
        if self.success {
            Ok(self.discount_amount)
        } else {
            Err(VoucherError::Invalid {
                code: code.to_string(),
                reason: self
                    .message
                    .unwrap_or_else(|| "rejected by the voucher service".to_string()),
            })
        }
    }
}

/// Voucher lookups and validation against the voucher service.
#[derive(Debug, Clone)]
pub struct VoucherService<V> {
    api: V,
}

impl<V: VouchersApi> VoucherService<V> {
    /// Create a voucher service over the given collaborator.
    pub fn new(api: V) -> Self {
        Self { api }
    }

    /// Vouchers the customer may use on an order of `order_amount`.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::Api`] if the lookup fails.
    #[tracing::instrument(
        name = "vouchers.service.eligible",
        skip(self, order_amount),
        fields(customer_id = %customer, voucher_count = tracing::field::Empty),
        err
    )]
    pub async fn eligible(
        &self,
        customer: &CustomerId,
        order_amount: Money<'static, Currency>,
    ) -> Result<Vec<Voucher<'static>>, VoucherError> {
        let vouchers = self.api.eligible_vouchers(customer, order_amount).await?;

        tracing::Span::current().record("voucher_count", vouchers.len());

        Ok(vouchers)
    }

    /// Validate a voucher with the voucher service and return the discount it grants.
    ///
    /// The minimum order amount is checked locally first, so an obviously ineligible voucher
    /// never reaches the network.
    ///
    /// # Errors
    ///
    /// - [`VoucherError::Invalid`]: rejected locally or by the server.
    /// - [`VoucherError::Api`]: the voucher service could not be reached.
    #[tracing::instrument(
        name = "vouchers.service.apply",
        skip(self, voucher, order_amount),
        fields(customer_id = %customer, voucher_code = %voucher.code),
        err
    )]
    pub async fn apply(
        &self,
        customer: &CustomerId,
        voucher: &Voucher<'static>,
        order_amount: Money<'static, Currency>,
    ) -> Result<Money<'static, Currency>, VoucherError> {
        voucher.check_eligible(&order_amount)?;

        let application = self
            .api
            .apply_voucher(customer, &voucher.code, order_amount)
            .await?;

        debug!(success = application.success, "voucher service replied");

        let discount = application.into_discount(&voucher.code)?;

        info!(discount = %discount, "voucher accepted");

        Ok(discount)
    }
}
