//! Core types for Espiga.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod role;

pub use id::*;
pub use money::format_currency;
pub use role::Role;
