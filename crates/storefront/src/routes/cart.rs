//! Cart handlers.
//!
//! Logged-in users work on their own cart. Guests get a cart token in their
//! session the first time they add something.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::ProductId;

use crate::error::AppError;
use crate::middleware::{OptionalAuth, cart_owner};
use crate::models::CartView;
use crate::services::CartService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(show).delete(clear))
        .route("/api/cart/items", post(add))
        .route(
            "/api/cart/items/{product_id}",
            put(update).delete(remove),
        )
}

/// Body for adding an item.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    /// Defaults to one.
    pub quantity: Option<i32>,
}

/// Body for setting a line's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// The current cart; empty when the session has none.
///
/// # Errors
///
/// Returns 500 if the session store or database fails.
pub async fn show(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartView>, AppError> {
    let Some(owner) = cart_owner(&session, user.as_ref(), false).await? else {
        return Ok(Json(CartView::empty()));
    };
    Ok(Json(CartService::new(state.pool()).get(&owner).await?))
}

/// Add a product, or more of it, to the cart.
///
/// # Errors
///
/// Returns 400 for a bad quantity, 404 for an unknown product, 409 when the
/// product is inactive or out of stock.
#[instrument(skip(state, session, user))]
pub async fn add(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>, AppError> {
    let owner = cart_owner(&session, user.as_ref(), true)
        .await?
        .ok_or_else(|| AppError::Internal("Could not create a cart".to_string()))?;

    let cart = CartService::new(state.pool())
        .add_item(&owner, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Set a line's quantity. Zero is rejected; use DELETE to remove a line.
///
/// # Errors
///
/// Returns 400 for a bad quantity, 404 if the product isn't in the cart,
/// 409 when stock can't cover it.
#[instrument(skip(state, session, user))]
pub async fn update(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartView>, AppError> {
    let owner = cart_owner(&session, user.as_ref(), false)
        .await?
        .ok_or_else(item_not_in_cart)?;

    let cart = CartService::new(state.pool())
        .update_quantity(&owner, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove a line from the cart.
///
/// # Errors
///
/// Returns 404 if the product isn't in the cart.
#[instrument(skip(state, session, user))]
pub async fn remove(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>, AppError> {
    let owner = cart_owner(&session, user.as_ref(), false)
        .await?
        .ok_or_else(item_not_in_cart)?;

    let cart = CartService::new(state.pool())
        .remove_item(&owner, product_id)
        .await?;
    Ok(Json(cart))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns 500 if the session store or database fails.
pub async fn clear(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartView>, AppError> {
    let Some(owner) = cart_owner(&session, user.as_ref(), false).await? else {
        return Ok(Json(CartView::empty()));
    };
    Ok(Json(CartService::new(state.pool()).clear(&owner).await?))
}

fn item_not_in_cart() -> AppError {
    AppError::NotFound("Item not in cart".to_string())
}
