//! Checkout and order history handlers.
//!
//! Guests may check out; the new order's ID is remembered in their session
//! so they can pay for it. Order history needs an account.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::OrderId;

use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAuth, cart_owner, record_guest_order};
use crate::models::{Order, OrderWithItems};
use crate::services::{CheckoutError, CheckoutRequest, CheckoutService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(index).post(checkout))
        .route("/api/orders/{id}", get(show))
        .route("/api/orders/{id}/cancel", post(cancel))
}

/// Build the checkout service from the shared config.
pub(crate) fn checkout_service(state: &AppState) -> CheckoutService<'_> {
    let config = state.config();
    CheckoutService::new(state.pool(), &config.shipping, &config.currency)
        .with_stripe(state.stripe())
}

/// Turn the current cart into a pending order.
///
/// Totals are computed on the server; `expected_total` only guards against
/// a stale cart page.
///
/// # Errors
///
/// Returns 400 for an empty cart, bad address or missing guest email, 409
/// when stock or prices changed.
#[instrument(skip(state, session, user, request))]
pub async fn checkout(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), AppError> {
    let owner = cart_owner(&session, user.as_ref(), false)
        .await?
        .ok_or(CheckoutError::EmptyCart)?;

    let placed = checkout_service(&state)
        .place_order(&owner, user.as_ref(), &request)
        .await?;

    if user.is_none() {
        record_guest_order(&session, placed.order.id).await?;
    }

    Ok((StatusCode::CREATED, Json(placed)))
}

/// The user's orders, newest first.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(checkout_service(&state).list_mine(user.id).await?))
}

/// One of the user's orders with its lines.
///
/// # Errors
///
/// Returns 404 if the order doesn't exist or belongs to someone else.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>, AppError> {
    Ok(Json(checkout_service(&state).get_mine(user.id, id).await?))
}

/// Cancel a pending, unpaid order and restock its items.
///
/// # Errors
///
/// Returns 404 for someone else's order, 409 once it is paid or shipped.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(checkout_service(&state).cancel_mine(user.id, id).await?))
}
