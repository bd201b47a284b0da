//! Business logic services for storefront.
//!
//! Services borrow the pool (and any API client they need) for the length of
//! one request and compose repositories into the operations route handlers
//! call. Each service returns its own error enum; `crate::error` maps those
//! onto HTTP responses.
//!
//! # Services
//!
//! - `auth` - Registration and password login (argon2)
//! - `cart` - Cart contents for users and guests, stock checks
//! - `checkout` - Order placement, order history, cancellation, admin status
//! - `payments` - Stripe payment intents and webhook reconciliation
//! - `referrals` - Referral code creation, validation and redemption
//! - `chat` - Shopping assistant backed by Gemini

pub mod auth;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod payments;
pub mod referrals;

pub use auth::{AuthError, AuthService, Registration};
pub use cart::{CartError, CartService};
pub use chat::{ChatError, ChatReply, ChatService, ChatTurn};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use payments::{IntentResponse, PaymentCaller, PaymentError, PaymentService};
pub use referrals::{CodeOptions, ReferralError, ReferralService};
