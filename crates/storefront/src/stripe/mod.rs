//! Stripe payments integration.
//!
//! A thin client over the payment intents API plus webhook signature
//! verification. Order bookkeeping lives in `services::payments`.

mod client;
mod error;
mod types;

pub use client::{StripeClient, WEBHOOK_TOLERANCE_SECS, verify_signature};
pub use error::StripeError;
pub use types::{Event, PaymentIntent, PaymentIntentStatus};
