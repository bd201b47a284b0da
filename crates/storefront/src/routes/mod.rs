//! HTTP route handlers for storefront.
//!
//! Everything except the health checks is JSON under `/api`. Paths outside
//! `/api` fall through to the single-page app when a static directory is
//! configured (see [`spa_fallback`]).
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database readiness
//!
//! # Auth (login/register rate limited)
//! POST /api/auth/register               - Create account, optional referral code
//! POST /api/auth/login                  - Log in, merge guest cart
//! POST /api/auth/logout                 - Log out
//! GET  /api/auth/me                     - Current user
//!
//! # Catalog
//! GET  /api/products                    - Filtered, paginated listing
//! GET  /api/products/{slug}             - Product detail
//! POST /api/products                    - Create (admin)
//! PUT  /api/products/{id}               - Replace (admin)
//! DELETE /api/products/{id}             - Deactivate (admin)
//! GET  /api/categories                  - All categories
//! GET  /api/categories/{slug}           - Category with its products
//! POST /api/categories                  - Create (admin)
//! PUT  /api/categories/{id}             - Update (admin)
//! DELETE /api/categories/{id}           - Delete (admin)
//!
//! # Cart (rate limited)
//! GET  /api/cart                        - Current cart
//! POST /api/cart/items                  - Add item
//! PUT  /api/cart/items/{product_id}     - Set quantity
//! DELETE /api/cart/items/{product_id}   - Remove item
//! DELETE /api/cart                      - Empty cart
//!
//! # Orders
//! POST /api/orders                      - Checkout (guests allowed)
//! GET  /api/orders                      - My orders
//! GET  /api/orders/{id}                 - My order with items
//! POST /api/orders/{id}/cancel          - Cancel my unpaid order
//! GET  /api/admin/orders                - All orders (admin)
//! PUT  /api/admin/orders/{id}/status    - Move order status (admin)
//!
//! # Account
//! GET  /api/addresses                   - Saved addresses
//! POST /api/addresses                   - Add address
//! PUT  /api/addresses/{id}              - Update address
//! DELETE /api/addresses/{id}            - Delete address
//! POST /api/addresses/{id}/default      - Make default for its type
//! GET  /api/referrals                   - My referral codes
//! POST /api/referrals                   - Create a code
//! GET  /api/referrals/{code}            - Validate a code (public)
//!
//! # Payments
//! POST /api/payments/intent             - Create Stripe payment intent
//! POST /api/payments/confirm            - Confirm payment after client flow
//! POST /api/payments/webhook            - Stripe webhook
//!
//! # Assistant (rate limited)
//! POST /api/chat                        - Shopping assistant
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod chat;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod referrals;

use std::path::Path;

use axum::{Router, routing::any};
use tower_http::services::{ServeDir, ServeFile};

use crate::error::AppError;
use crate::middleware::{cart_rate_limiter, chat_rate_limiter};
use crate::state::AppState;

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(cart::router().layer(cart_rate_limiter()))
        .merge(orders::router())
        .merge(admin::router())
        .merge(addresses::router())
        .merge(referrals::router())
        .merge(payments::router())
        .merge(chat::router().layer(chat_rate_limiter()))
        // Unknown API paths get a JSON 404 instead of the SPA shell
        .route("/api", any(api_not_found))
        .route("/api/{*rest}", any(api_not_found))
}

/// Serve the built client, answering unknown paths with `index.html` so
/// client-side routing works on reload.
#[must_use]
pub fn spa_fallback(static_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")))
}

async fn api_not_found() -> AppError {
    AppError::NotFound("No such endpoint".to_string())
}
