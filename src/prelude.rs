//! Orderly prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    allocation::{Allocation, AllocationError, allocate_discount, clear_allocation},
    api::{
        ApiError, CatalogApi, CheckoutApi, CheckoutRequest, CustomersApi, OrderLine,
        OrderRequest, OrdersApi, VouchersApi, http::HttpApi,
    },
    assembler::{
        OrderSubmitter, RequiredField, SubmitError, ValidationError, assemble, validate,
    },
    catalog::{Variant, VariantId},
    customers::{Customer, CustomerId, VipDiscount},
    draft::{DraftError, DraftId, DraftOrder, PaymentMethod},
    fulfillment::{
        FulfillmentError, FulfillmentService, OrderStatus, TransitionError, ensure_deletable,
        plan_transition,
    },
    items::{LineItem, LineItemKey},
    loyalty::{LoyaltyError, LoyaltyRates},
    orders::{Order, OrderId},
    pricing::PricingError,
    resolver::{ItemResolver, ResolveError, price_variant},
    summary::{
        CheckoutService, CheckoutSummary, Quote, SummaryError, SummaryInput, SummarySource,
        calculate, for_draft,
    },
    vouchers::{Voucher, VoucherError, VoucherKind, VoucherService, VoucherValue},
};
