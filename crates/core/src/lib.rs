//! Espiga Core - Shared domain library.
//!
//! This crate provides the types and computations shared across the Espiga
//! dashboard:
//! - `dashboard` - Server-rendered web dashboard over the bakery backend
//! - `integration-tests` - Backend-client integration tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! HTTP clients, no async. Price lookups and stock listings are performed by
//! the caller and fed in as values, which keeps every form computation
//! deterministic and testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, currency formatting, roles
//! - [`pricing`] - Price tiers and explicit price-lookup results
//! - [`line_items`] - The line-item editor behind order/return/receipt forms
//! - [`stock`] - Per-product aggregation of stock lots
//! - [`validate`] - Pre-submission validation of a line-item form

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod line_items;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validate;

pub use line_items::{LineItem, LineItemEditor};
pub use pricing::{PriceLookup, PriceTier};
pub use stock::{AggregatedStock, StockLot, aggregate_by_product};
pub use types::*;
pub use validate::{SubmissionError, validate_submission};
