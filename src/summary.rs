//! Checkout summary
//!
//! The summary is derived from the draft and never edited by hand. Discounts stack in a fixed
//! order, each one working on what the previous ones left:
//!
//! 1. the voucher, on the undiscounted subtotal;
//! 2. loyalty points, never more than the subtotal left after the voucher;
//! 3. the VIP discount, on what is left after voucher and points.
//!
//! The grand total never drops below zero before shipping is added. Points earned are
//! computed on the gross subtotal.

use std::io;

use rusty_money::{Money, iso::Currency};
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::{CheckoutApi, CheckoutRequest, OrderLine},
    customers::VipDiscount,
    draft::DraftOrder,
    loyalty::{LoyaltyRates, clamp_redeemable},
    pricing::{PricingError, ensure_currency},
    vouchers::Voucher,
};

/// Errors that can occur while computing or rendering a summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Wrapped price arithmetic or currency mismatch error.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Writing the rendered summary failed.
    #[error("failed to write summary: {0}")]
    Io(#[from] io::Error),
}

/// Totals shown at checkout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckoutSummary<'a> {
    /// Undiscounted subtotal
    pub subtotal: Money<'a, Currency>,

    /// Voucher discount
    pub voucher_discount: Money<'a, Currency>,

    /// Loyalty points redeemed
    pub points_redeemed: u64,

    /// Discount bought with the redeemed points
    pub points_discount: Money<'a, Currency>,

    /// VIP tier discount
    pub vip_discount: Money<'a, Currency>,

    /// Shipping fee, when known
    pub shipping_fee: Option<Money<'a, Currency>>,

    /// Amount payable
    pub grand_total: Money<'a, Currency>,

    /// Loyalty points this order earns
    pub points_earned: u64,
}

impl<'a> CheckoutSummary<'a> {
    /// Sum of the three discount channels.
    pub fn total_discount(&self) -> Money<'a, Currency> {
        let minor = self
            .voucher_discount
            .to_minor_units()
            .saturating_add(self.points_discount.to_minor_units())
            .saturating_add(self.vip_discount.to_minor_units());

        Money::from_minor(minor, self.subtotal.currency())
    }

    /// Render the draft's line items and these totals as tables.
    ///
    /// Line items a voucher has reduced show their original price struck through.
    ///
    /// # Errors
    ///
    /// Returns an error if a line total overflows or the output cannot be written.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        draft: &DraftOrder<'_>,
    ) -> Result<(), SummaryError> {
        let mut items = Builder::default();

        items.push_record(["", "Item", "Qty", "Unit Price", "Line Total"]);

        for (idx, (_key, item)) in draft.items().enumerate() {
            let unit_price = match item.original_unit_price() {
                Some(original) => format!("\x1b[9m{original}\x1b[0m {}", item.unit_price()),
                None => item.unit_price().to_string(),
            };

            items.push_record([
                format!("#{:<3}", idx + 1),
                item.name().to_string(),
                item.quantity().to_string(),
                unit_price,
                item.line_total()?.to_string(),
            ]);
        }

        let mut table = items.build();

        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(2..), Alignment::right());

        writeln!(out, "\n{table}")?;

        let mut totals = Builder::default();

        totals.push_record(["Subtotal".to_string(), self.subtotal.to_string()]);

        if self.voucher_discount.to_minor_units() > 0 {
            let label = draft
                .voucher()
                .map_or_else(|| "Voucher".to_string(), |voucher| format!("Voucher {}", voucher.code));

            totals.push_record([label, format!("-{}", self.voucher_discount)]);
        }

        if self.points_discount.to_minor_units() > 0 {
            totals.push_record([
                format!("Points ({} pts)", self.points_redeemed),
                format!("-{}", self.points_discount),
            ]);
        }

        if self.vip_discount.to_minor_units() > 0 {
            totals.push_record(["VIP".to_string(), format!("-{}", self.vip_discount)]);
        }

        totals.push_record([
            "Shipping".to_string(),
            self.shipping_fee
                .map_or_else(|| "pending".to_string(), |fee| fee.to_string()),
        ]);

        totals.push_record(["\x1b[1mTotal\x1b[0m".to_string(), self.grand_total.to_string()]);
        totals.push_record(["Points earned".to_string(), self.points_earned.to_string()]);

        let mut table = totals.build();

        table.with(Style::modern_rounded());
        table.modify(Columns::new(1..), Alignment::right());

        writeln!(out, "{table}")?;

        Ok(())
    }
}

/// Everything the calculator needs, independent of where it came from.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'s, 'a> {
    /// Undiscounted subtotal
    pub subtotal: Money<'a, Currency>,

    /// Selected voucher
    pub voucher: Option<&'s Voucher<'a>>,

    /// Points the customer asked to redeem
    pub points_to_redeem: u64,

    /// Points the customer holds
    pub point_balance: u64,

    /// VIP benefit of the customer
    pub vip: VipDiscount<'a>,

    /// Shipping fee, when known
    pub shipping_fee: Option<Money<'a, Currency>>,
}

/// Compute a checkout summary.
///
/// Pure and idempotent: the same input always yields the same summary.
///
/// # Errors
///
/// Returns [`PricingError`] if any amount is in another currency or arithmetic overflows.
pub fn calculate<'a>(
    input: &SummaryInput<'_, 'a>,
    rates: &LoyaltyRates<'_>,
) -> Result<CheckoutSummary<'a>, PricingError> {
    let currency = input.subtotal.currency();
    let subtotal = input.subtotal.to_minor_units().max(0);

    let voucher = match input.voucher {
        Some(voucher) => voucher.discount_for(&input.subtotal)?.to_minor_units(),
        None => 0,
    };

    ensure_currency(&rates.reward_money_per_point(), currency)?;

    let points_redeemed = clamp_redeemable(input.points_to_redeem, input.point_balance);
    let points_value = rates.redemption_value(points_redeemed)?.to_minor_units();
    let after_voucher = subtotal.saturating_sub(voucher).max(0);
    let points = points_value.min(after_voucher);

    let after_points = after_voucher - points;
    let vip = input.vip.amount_on(after_points, currency)?;

    let net = after_points - vip;

    let shipping_fee = match input.shipping_fee {
        Some(fee) => {
            ensure_currency(&fee, currency)?;
            Some(fee)
        }
        None => None,
    };

    let grand_total = match shipping_fee {
        Some(fee) => net
            .checked_add(fee.to_minor_units())
            .ok_or(PricingError::Overflow)?,
        None => net,
    };

    Ok(CheckoutSummary {
        subtotal: Money::from_minor(subtotal, currency),
        voucher_discount: Money::from_minor(voucher, currency),
        points_redeemed,
        points_discount: Money::from_minor(points, currency),
        vip_discount: Money::from_minor(vip, currency),
        shipping_fee,
        grand_total: Money::from_minor(grand_total, currency),
        points_earned: rates.points_earned(&input.subtotal)?,
    })
}

/// Compute the local checkout summary for a draft.
///
/// # Errors
///
/// Returns [`PricingError`] if any amount is in another currency or arithmetic overflows.
pub fn for_draft<'a>(
    draft: &DraftOrder<'a>,
    rates: &LoyaltyRates<'_>,
) -> Result<CheckoutSummary<'a>, PricingError> {
    let customer = draft.customer();

    let input = SummaryInput {
        subtotal: draft.subtotal()?,
        voucher: draft.voucher(),
        points_to_redeem: draft.points_to_redeem(),
        point_balance: customer.map_or(0, |customer| customer.point_balance),
        vip: customer.map_or(VipDiscount::None, |customer| customer.vip),
        shipping_fee: draft.shipping_fee(),
    };

    calculate(&input, rates)
}

/// Body of the server-side summary request for a draft.
pub fn checkout_request(draft: &DraftOrder<'_>) -> CheckoutRequest {
    CheckoutRequest {
        line_items: draft.items().map(|(_key, item)| OrderLine::from(item)).collect(),
        customer_id: draft.customer().map(|customer| customer.id.to_string()),
        points_used: draft.points_to_redeem(),
        voucher_code: draft.voucher().map(|voucher| voucher.code.clone()),
        shipping_fee: draft.shipping_fee().map(|fee| fee.to_minor_units()),
    }
}

/// Where a summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    /// Computed by the backend
    Server,

    /// Computed locally because the backend could not be reached
    Local,
}

/// A summary together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote<'a> {
    /// The summary to show and submit
    pub summary: CheckoutSummary<'a>,

    /// Where it came from
    pub source: SummarySource,
}

/// Produces the summary a draft is shown and submitted with.
///
/// The backend's summary wins whenever it is available; the local estimate is used only when
/// the backend cannot be reached, and any disagreement is logged.
#[derive(Debug, Clone)]
pub struct CheckoutService<C> {
    api: C,
    rates: LoyaltyRates<'static>,
}

impl<C: CheckoutApi> CheckoutService<C> {
    /// Create a checkout service over the given collaborator.
    pub fn new(api: C, rates: LoyaltyRates<'static>) -> Self {
        Self { api, rates }
    }

    /// Loyalty rates used for the local estimate
    pub fn rates(&self) -> &LoyaltyRates<'static> {
        &self.rates
    }

    /// Summarise a draft, preferring the backend's figures.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Pricing`] if the local estimate cannot be computed. Backend
    /// failures are not errors: the local estimate is returned instead.
    #[tracing::instrument(
        name = "checkout.service.summarize",
        skip(self, draft),
        fields(draft_id = %draft.id(), source = tracing::field::Empty),
        err
    )]
    pub async fn summarize(
        &self,
        draft: &DraftOrder<'static>,
    ) -> Result<Quote<'static>, SummaryError> {
        let local = for_draft(draft, &self.rates)?;
        let request = checkout_request(draft);

        let quote = match self.api.checkout_summary(&request).await {
            Ok(server) => {
                if server != local {
                    warn!(
                        local_total = %local.grand_total,
                        server_total = %server.grand_total,
                        "local summary differs from server summary"
                    );
                }

                Quote {
                    summary: server,
                    source: SummarySource::Server,
                }
            }
            Err(error) => {
                warn!(
                    %error,
                    retryable = error.is_retryable(),
                    "checkout summary unavailable, using local estimate"
                );

                Quote {
                    summary: local,
                    source: SummarySource::Local,
                }
            }
        };

        tracing::Span::current().record("source", tracing::field::debug(quote.source));

        info!(grand_total = %quote.summary.grand_total, "checkout summarised");

        Ok(quote)
    }
}
