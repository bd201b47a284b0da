//! Emporium Core - Shared domain types.
//!
//! This crate provides the types used across all Emporium components:
//! - `storefront` - REST API consumed by the single-page shop client
//! - `cli` - Command-line tools for migrations, seeding and supplier sync
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Order totals are computed here so that the checkout
//! service and its tests share one implementation.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, slugs, money arithmetic and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
