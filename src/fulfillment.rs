//! Fulfillment
//!
//! Orders move through a fixed set of statuses. Every status may be "re-selected" in the
//! table below, but a request to stay in the current status is a no-op and is refused before
//! any call to the order service, as is any move outside the table.
//!
//! | current    | allowed next                       |
//! |------------|------------------------------------|
//! | PENDING    | PENDING, PROCESSING, CANCELLED     |
//! | PROCESSING | PROCESSING, SHIPPING, CANCELLED    |
//! | SHIPPING   | SHIPPING, DELIVERED, CANCELLED     |
//! | DELIVERED  | DELIVERED, COMPLETED, CANCELLED    |
//! | COMPLETED  | COMPLETED                          |
//! | CANCELLED  | CANCELLED                          |
//!
//! Orders can only be deleted once cancelled.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::{ApiError, OrdersApi},
    orders::{Order, OrderId},
};

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, not yet picked
    Pending,

    /// Being picked and packed
    Processing,

    /// Handed to the carrier
    Shipping,

    /// Received by the customer
    Delivered,

    /// Closed
    Completed,

    /// Cancelled
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Backend encoding of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipping => "SHIPPING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses this status may be set to, itself included.
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[
                OrderStatus::Pending,
                OrderStatus::Processing,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Processing => &[
                OrderStatus::Processing,
                OrderStatus::Shipping,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Shipping => &[
                OrderStatus::Shipping,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Delivered => &[
                OrderStatus::Delivered,
                OrderStatus::Completed,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Completed => &[OrderStatus::Completed],
            OrderStatus::Cancelled => &[OrderStatus::Cancelled],
        }
    }

    /// Statuses an order can actually move on to, excluding staying put.
    pub fn successors(&self) -> impl Iterator<Item = OrderStatus> + '_ {
        self.allowed_next()
            .iter()
            .copied()
            .filter(move |next| next != self)
    }

    /// Whether the order can never change status again.
    pub fn is_terminal(&self) -> bool {
        self.successors().next().is_none()
    }

    /// Whether the order may be deleted in this status.
    pub fn is_deletable(&self) -> bool {
        *self == OrderStatus::Cancelled
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_uppercase();

        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalised)
            .ok_or_else(|| TransitionError::UnknownStatus(s.to_string()))
    }
}

/// Rejected status changes.
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    /// The order is already in the requested status.
    #[error("order is already {0}")]
    Unchanged(OrderStatus),

    /// The requested status is not reachable from the current one.
    #[error("cannot move an order from {from} to {to}")]
    IllegalTransition {
        /// Current status
        from: OrderStatus,

        /// Requested status
        to: OrderStatus,
    },

    /// Only cancelled orders may be deleted.
    #[error("cannot delete an order that is {0}, only CANCELLED orders can be deleted")]
    DeletionNotAllowed(OrderStatus),

    /// The backend reported a status this engine does not know.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}

/// Validate a status change without side effects.
///
/// # Errors
///
/// - [`TransitionError::Unchanged`]: `requested` equals `current`.
/// - [`TransitionError::IllegalTransition`]: `requested` is outside the table for `current`.
pub fn plan_transition(
    current: OrderStatus,
    requested: OrderStatus,
) -> Result<OrderStatus, TransitionError> {
    if current == requested {
        return Err(TransitionError::Unchanged(current));
    }

    if current.allowed_next().contains(&requested) {
        Ok(requested)
    } else {
        Err(TransitionError::IllegalTransition {
            from: current,
            to: requested,
        })
    }
}

/// Check that an order in `status` may be deleted.
///
/// # Errors
///
/// Returns [`TransitionError::DeletionNotAllowed`] unless the order is cancelled.
pub fn ensure_deletable(status: OrderStatus) -> Result<(), TransitionError> {
    if status.is_deletable() {
        Ok(())
    } else {
        Err(TransitionError::DeletionNotAllowed(status))
    }
}

/// Errors from the fulfillment service.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request was rejected locally; nothing was sent.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The order service failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Applies validated status changes and deletions through the order service.
///
/// Holds no state of its own: the caller supplies the status it last saw for the order.
#[derive(Debug, Clone)]
pub struct FulfillmentService<O> {
    api: O,
}

impl<O: OrdersApi> FulfillmentService<O> {
    /// Create a fulfillment service over the given order service.
    pub fn new(api: O) -> Self {
        Self { api }
    }

    /// Move an order from `current` to `requested`.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::Transition`]: the change was rejected locally.
    /// - [`FulfillmentError::Api`]: the order service failed.
    #[tracing::instrument(
        name = "fulfillment.service.change_status",
        skip(self),
        fields(order_id = %id, from = %current, to = %requested),
        err
    )]
    pub async fn change_status(
        &self,
        id: &OrderId,
        current: OrderStatus,
        requested: OrderStatus,
    ) -> Result<Order<'static>, FulfillmentError> {
        let next = plan_transition(current, requested).inspect_err(|error| {
            warn!(%error, "status change rejected");
        })?;

        let order = self.api.update_status(id, next).await?;

        info!(status = %order.status, "order status changed");

        Ok(order)
    }

    /// Delete an order currently in `status`.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::Transition`]: the order is not cancelled.
    /// - [`FulfillmentError::Api`]: the order service failed.
    #[tracing::instrument(
        name = "fulfillment.service.delete",
        skip(self, id, status),
        fields(order_id = %id, status = %status),
        err
    )]
    pub async fn delete(&self, id: &OrderId, status: OrderStatus) -> Result<(), FulfillmentError> {
        ensure_deletable(status).inspect_err(|error| {
            warn!(%error, "deletion rejected");
        })?;

        self.api.delete_order(id).await?;

        info!("order deleted");

        Ok(())
    }
}
