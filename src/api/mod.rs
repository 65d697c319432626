//! Backend collaborators
//!
//! Every external service the engine talks to sits behind one of the traits here. The
//! [`http::HttpApi`] client implements all of them against the REST backend, and tests use
//! the generated `Mock*` types.

use async_trait::async_trait;
use mockall::automock;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    catalog::{Variant, VariantId},
    customers::{Customer, CustomerId},
    fulfillment::OrderStatus,
    orders::{Order, OrderId},
    summary::CheckoutSummary,
    vouchers::{Voucher, VoucherApplication},
};

pub mod http;
pub mod wire;

pub use wire::{CheckoutRequest, OrderLine, OrderRequest};

/// Errors talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,

        /// Response body, as text
        body: String,
    },

    /// The response body could not be normalised into a domain type.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The configured backend URL cannot be used as a base for endpoints.
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether retrying the same request could succeed.
    ///
    /// Nothing in the engine retries on its own; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(error) => error.is_timeout() || error.is_connect(),
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::Decode(_) | ApiError::InvalidUrl(_) => false,
        }
    }

    /// Whether the backend reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Variant search and lookup.
#[automock]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Search variants by free-text query.
    async fn search_variants(&self, query: &str) -> Result<Vec<Variant<'static>>, ApiError>;

    /// Look up a single variant; `None` when it does not exist.
    async fn find_variant(&self, id: &VariantId) -> Result<Option<Variant<'static>>, ApiError>;
}

/// Customer lookup.
#[automock]
#[async_trait]
pub trait CustomersApi: Send + Sync {
    /// Find a customer by phone number; `None` when nobody matches.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer<'static>>, ApiError>;
}

/// Voucher eligibility and application.
#[automock]
#[async_trait]
pub trait VouchersApi: Send + Sync {
    /// Vouchers the customer may use on an order of `order_amount`.
    async fn eligible_vouchers(
        &self,
        customer: &CustomerId,
        order_amount: Money<'static, Currency>,
    ) -> Result<Vec<Voucher<'static>>, ApiError>;

    /// Ask the voucher service to apply `code` to an order of `order_amount`.
    async fn apply_voucher(
        &self,
        customer: &CustomerId,
        code: &str,
        order_amount: Money<'static, Currency>,
    ) -> Result<VoucherApplication<'static>, ApiError>;
}

/// Server-side checkout summary.
#[automock]
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// Compute the authoritative checkout summary for a draft.
    async fn checkout_summary(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSummary<'static>, ApiError>;
}

/// Order creation, status updates and deletion.
#[automock]
#[async_trait]
pub trait OrdersApi: Send + Sync {
    /// Create an order.
    async fn create_order(&self, request: &OrderRequest) -> Result<Order<'static>, ApiError>;

    /// Move an order to a new status.
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order<'static>, ApiError>;

    /// Delete an order.
    async fn delete_order(&self, id: &OrderId) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let error = ApiError::Status {
            status: 503,
            body: String::new(),
        };

        assert!(error.is_retryable());
    }

    #[test]
    fn rate_limits_are_retryable() {
        let error = ApiError::Status {
            status: 429,
            body: String::new(),
        };

        assert!(error.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let error = ApiError::Status {
            status: 422,
            body: "invalid".to_string(),
        };

        assert!(!error.is_retryable());
        assert!(!ApiError::Decode("bad".to_string()).is_retryable());
    }

    #[test]
    fn not_found_is_detected() {
        let error = ApiError::Status {
            status: 404,
            body: String::new(),
        };

        assert!(error.is_not_found());
    }
}
