//! Orderly
//!
//! Orderly is the pricing, discount allocation and fulfillment engine behind a retail
//! order-management backend: it prices draft orders from catalog variants, stacks voucher,
//! loyalty-point and VIP discounts into a checkout summary, spreads the voucher back across
//! line items for display, and polices order-status transitions.

pub mod allocation;
pub mod api;
pub mod assembler;
pub mod catalog;
pub mod config;
pub mod customers;
pub mod draft;
pub mod fixtures;
pub mod fulfillment;
pub mod items;
pub mod logging;
pub mod loyalty;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod resolver;
pub mod summary;
pub mod vouchers;
