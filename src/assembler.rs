//! Order assembly and submission
//!
//! A draft becomes an order request only once its contact fields are filled in and it holds
//! at least one resolved line item. Submission is single-flight per draft: a second submit
//! while the first is still waiting on the backend is refused, and a failed submission is
//! never retried automatically. The draft itself is only ever borrowed, so it stays editable
//! whatever the outcome.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{Span, info, warn};

use crate::{
    api::{ApiError, OrderLine, OrderRequest, OrdersApi},
    draft::{DraftId, DraftOrder},
    orders::Order,
    summary::CheckoutSummary,
};

/// A field that must be filled in before a draft can be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    /// Contact name
    CustomerName,

    /// Contact phone
    CustomerPhone,

    /// Shipping address
    ShippingAddress,

    /// At least one line item with a resolved variant
    LineItems,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequiredField::CustomerName => "customer name",
            RequiredField::CustomerPhone => "customer phone",
            RequiredField::ShippingAddress => "shipping address",
            RequiredField::LineItems => "line items",
        })
    }
}

/// The draft is missing required fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required fields: {}", join_fields(.missing))]
pub struct ValidationError {
    /// Every missing field, in form order
    pub missing: SmallVec<[RequiredField; 4]>,
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check that a draft can be submitted.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every missing field.
pub fn validate(draft: &DraftOrder<'_>) -> Result<(), ValidationError> {
    let mut missing = SmallVec::new();

    if draft.customer_name().trim().is_empty() {
        missing.push(RequiredField::CustomerName);
    }

    if draft.customer_phone().trim().is_empty() {
        missing.push(RequiredField::CustomerPhone);
    }

    if draft.shipping_address().trim().is_empty() {
        missing.push(RequiredField::ShippingAddress);
    }

    if !draft
        .items()
        .any(|(_key, item)| !item.variant_id().is_blank())
    {
        missing.push(RequiredField::LineItems);
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { missing })
    }
}

/// Build the order creation request from a draft and the summary it was shown with.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the draft is not submittable.
pub fn assemble(
    draft: &DraftOrder<'_>,
    summary: &CheckoutSummary<'_>,
) -> Result<OrderRequest, ValidationError> {
    validate(draft)?;

    let notes = draft.notes().trim();

    Ok(OrderRequest {
        customer_id: draft.customer().map(|customer| customer.id.to_string()),
        customer_name: draft.customer_name().trim().to_string(),
        customer_phone: draft.customer_phone().trim().to_string(),
        shipping_address: draft.shipping_address().trim().to_string(),
        line_items: draft
            .items()
            .filter(|(_key, item)| !item.variant_id().is_blank())
            .map(|(_key, item)| OrderLine::from(item))
            .collect(),
        voucher_code: draft.voucher().map(|voucher| voucher.code.clone()),
        points_used: summary.points_redeemed,
        payment_method: draft.payment_method(),
        notes: (!notes.is_empty()).then(|| notes.to_string()),
        subtotal: summary.subtotal.to_minor_units(),
        voucher_discount: summary.voucher_discount.to_minor_units(),
        points_discount: summary.points_discount.to_minor_units(),
        vip_discount: summary.vip_discount.to_minor_units(),
        shipping_fee: summary.shipping_fee.map(|fee| fee.to_minor_units()),
        grand_total: summary.grand_total.to_minor_units(),
    })
}

/// Errors from submitting an order.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The draft is not submittable; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A submission for this draft is already waiting on the backend.
    #[error("draft {0} is already being submitted")]
    AlreadyInFlight(DraftId),

    /// The order service failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Submits drafts to the order service, at most one submission per draft at a time.
#[derive(Debug)]
pub struct OrderSubmitter<O> {
    api: O,
    in_flight: Mutex<FxHashSet<DraftId>>,
}

/// Marks a draft as being submitted until dropped.
#[derive(Debug)]
pub struct SubmissionGuard<'s> {
    in_flight: &'s Mutex<FxHashSet<DraftId>>,
    draft: DraftId,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.draft);
    }
}

impl<O: OrdersApi> OrderSubmitter<O> {
    /// Create a submitter over the given order service.
    pub fn new(api: O) -> Self {
        Self {
            api,
            in_flight: Mutex::new(FxHashSet::default()),
        }
    }

    /// Claim the right to submit `draft`, released when the guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::AlreadyInFlight`] if the draft is already claimed.
    pub fn claim(&self, draft: DraftId) -> Result<SubmissionGuard<'_>, SubmitError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !in_flight.insert(draft) {
            return Err(SubmitError::AlreadyInFlight(draft));
        }

        Ok(SubmissionGuard {
            in_flight: &self.in_flight,
            draft,
        })
    }

    /// Whether a submission for `draft` is currently in flight.
    pub fn is_in_flight(&self, draft: DraftId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&draft)
    }

    /// Validate, assemble and send a draft exactly once.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Validation`]: the draft is missing required fields.
    /// - [`SubmitError::AlreadyInFlight`]: the draft is already being submitted.
    /// - [`SubmitError::Api`]: the order service failed. The draft is left untouched.
    #[tracing::instrument(
        name = "orders.submitter.submit",
        skip(self, draft, summary),
        fields(
            draft_id = %draft.id(),
            line_count = draft.len(),
            order_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn submit(
        &self,
        draft: &DraftOrder<'_>,
        summary: &CheckoutSummary<'_>,
    ) -> Result<Order<'static>, SubmitError> {
        let request = assemble(draft, summary).inspect_err(|error| {
            warn!(%error, "draft is not submittable");
        })?;

        let _guard = self.claim(draft.id())?;

        let order = self.api.create_order(&request).await.inspect_err(|error| {
            warn!(%error, retryable = error.is_retryable(), "order creation failed");
        })?;

        Span::current().record("order_id", tracing::field::display(&order.id));

        info!(status = %order.status, grand_total = request.grand_total, "order created");

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use rusty_money::{Money, iso::VND};
    use testresult::TestResult;

    use crate::{
        api::MockOrdersApi,
        catalog::VariantId,
        customers::VipDiscount,
        draft::PaymentMethod,
        fulfillment::OrderStatus,
        items::LineItem,
        loyalty::LoyaltyRates,
        orders::OrderId,
        summary::{SummaryInput, calculate},
    };

    use super::*;

    fn draft() -> Result<DraftOrder<'static>, Box<dyn std::error::Error>> {
        let mut draft = DraftOrder::new(VND);

        draft.set_contact("Nguyen Van A", "0901234567");
        draft.set_shipping_address("12 Ly Thuong Kiet, Ha Noi");
        draft.set_payment_method(PaymentMethod::CashOnDelivery);
        draft.add_item(LineItem::new(
            VariantId::new("v-1"),
            "Linen shirt",
            NonZeroU32::MIN,
            Money::from_minor(300_000, VND),
        ))?;

        Ok(draft)
    }

    fn summary(
        draft: &DraftOrder<'static>,
    ) -> Result<CheckoutSummary<'static>, Box<dyn std::error::Error>> {
        let rates = LoyaltyRates::new(Money::from_minor(100_000, VND), 10)?;

        Ok(calculate(
            &SummaryInput {
                subtotal: draft.subtotal()?,
                voucher: None,
                points_to_redeem: 0,
                point_balance: 0,
                vip: VipDiscount::None,
                shipping_fee: None,
            },
            &rates,
        )?)
    }

    #[test]
    fn empty_draft_lists_every_missing_field() {
        let draft = DraftOrder::new(VND);

        let error = validate(&draft).err();

        assert_eq!(
            error.map(|error| error.missing.into_vec()),
            Some(vec![
                RequiredField::CustomerName,
                RequiredField::CustomerPhone,
                RequiredField::ShippingAddress,
                RequiredField::LineItems,
            ])
        );
    }

    #[test]
    fn blank_contact_fields_are_missing() -> TestResult {
        let mut draft = draft()?;

        draft.set_contact("  ", "0901234567");

        let error = validate(&draft).err().ok_or("expected a validation error")?;

        assert_eq!(error.missing.as_slice(), &[RequiredField::CustomerName]);
        assert_eq!(error.to_string(), "missing required fields: customer name");

        Ok(())
    }

    #[test]
    fn unresolved_items_do_not_count() -> TestResult {
        let mut draft = DraftOrder::new(VND);

        draft.set_contact("A", "1");
        draft.set_shipping_address("Somewhere");
        draft.add_item(LineItem::new(
            VariantId::new(""),
            "Unknown",
            NonZeroU32::MIN,
            Money::from_minor(1, VND),
        ))?;

        let error = validate(&draft).err().ok_or("expected a validation error")?;

        assert_eq!(error.missing.as_slice(), &[RequiredField::LineItems]);

        Ok(())
    }

    #[test]
    fn assembled_request_mirrors_summary() -> TestResult {
        let draft = draft()?;
        let summary = summary(&draft)?;

        let request = assemble(&draft, &summary)?;

        assert_eq!(request.customer_name, "Nguyen Van A");
        assert_eq!(request.payment_method, PaymentMethod::CashOnDelivery);
        assert_eq!(request.line_items.len(), 1);
        assert_eq!(request.subtotal, 300_000);
        assert_eq!(request.grand_total, 300_000);
        assert_eq!(request.notes, None);

        Ok(())
    }

    #[tokio::test]
    async fn submit_sends_once() -> TestResult {
        let draft = draft()?;
        let summary = summary(&draft)?;

        let mut api = MockOrdersApi::new();

        api.expect_create_order()
            .once()
            .withf(|request| request.grand_total == 300_000)
            .return_once(|_| Ok(Order::new(OrderId::new("o-1"), OrderStatus::Pending)));

        let submitter = OrderSubmitter::new(api);

        let order = submitter.submit(&draft, &summary).await?;

        assert_eq!(order.id, OrderId::new("o-1"));
        assert!(!submitter.is_in_flight(draft.id()));

        Ok(())
    }

    #[tokio::test]
    async fn invalid_draft_is_never_sent() -> TestResult {
        let draft = DraftOrder::new(VND);
        let summary = summary(&draft)?;

        let mut api = MockOrdersApi::new();

        api.expect_create_order().never();

        let result = OrderSubmitter::new(api).submit(&draft, &summary).await;

        assert!(matches!(result, Err(SubmitError::Validation(_))));

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_submission_is_refused() -> TestResult {
        let draft = draft()?;
        let summary = summary(&draft)?;

        let mut api = MockOrdersApi::new();

        api.expect_create_order().never();

        let submitter = OrderSubmitter::new(api);
        let _held = submitter.claim(draft.id())?;

        let result = submitter.submit(&draft, &summary).await;

        assert!(matches!(result, Err(SubmitError::AlreadyInFlight(id)) if id == draft.id()));

        Ok(())
    }

    #[tokio::test]
    async fn failed_submission_releases_claim() -> TestResult {
        let draft = draft()?;
        let summary = summary(&draft)?;

        let mut api = MockOrdersApi::new();

        api.expect_create_order().once().return_once(|_| {
            Err(ApiError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let submitter = OrderSubmitter::new(api);

        let result = submitter.submit(&draft, &summary).await;

        assert!(matches!(result, Err(SubmitError::Api(_))));
        assert!(!submitter.is_in_flight(draft.id()));
        assert_eq!(draft.len(), 1);

        Ok(())
    }
}
