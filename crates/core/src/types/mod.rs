//! Core types for Emporium.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{LineAmount, OrderTotals, ShippingPolicy, format_usd, round_currency, to_minor_units};
pub use slug::{Slug, SlugError};
pub use status::*;
