//! Espiga bakery-management dashboard.
//!
//! Server-rendered administration panel for a bakery's daily operations:
//! products, clients, cities, delivery routes (repartos), stock lots
//! (existencias), orders (pedidos), returns (devoluciones) and delivery
//! receipts (remitos).
//!
//! # Architecture
//!
//! - Axum web framework, Askama templates for server-side rendering
//! - The backend REST API is the single source of truth - no local
//!   database, every screen reads and writes through [`backend`]
//! - `tower-sessions` keeps the backend-issued bearer token and the
//!   logged-in user's role server-side
//! - Domain logic (line-item drafts, price lookups, stock aggregation,
//!   validation) lives in `espiga-core` and is free of I/O

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
