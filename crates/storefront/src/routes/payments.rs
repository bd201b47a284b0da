//! Stripe payment handlers.
//!
//! The client creates an intent for an order, completes the card flow with
//! Stripe.js, then asks us to confirm. The webhook is the backstop when the
//! browser never comes back.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::OrderId;

use crate::error::AppError;
use crate::middleware::{OptionalAuth, guest_order_ids};
use crate::models::{CurrentUser, Order};
use crate::services::{IntentResponse, PaymentCaller, PaymentService};
use crate::state::AppState;

/// Header carrying the webhook signature.
const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/intent", post(create_intent))
        .route("/api/payments/confirm", post(confirm))
        .route("/api/payments/webhook", post(webhook))
}

/// Body naming the order to pay.
#[derive(Debug, Deserialize)]
pub struct OrderPaymentRequest {
    pub order_id: OrderId,
}

/// Create (or reuse) a payment intent for an order.
///
/// # Errors
///
/// Returns 404 if the caller doesn't own the order, 409 if it isn't payable,
/// 503 when payments aren't configured.
#[instrument(skip(state, session, user))]
pub async fn create_intent(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<OrderPaymentRequest>,
) -> Result<Json<IntentResponse>, AppError> {
    let guest_orders = guest_orders(&session, user.as_ref()).await?;
    let intent = PaymentService::new(state.pool(), state.stripe())
        .create_intent_for_order(caller(user.as_ref(), &guest_orders), body.order_id)
        .await?;
    Ok(Json(intent))
}

/// Re-read the order's intent from Stripe and record the outcome.
///
/// # Errors
///
/// Returns 404 if the caller doesn't own the order, 502 if Stripe fails.
#[instrument(skip(state, session, user))]
pub async fn confirm(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<OrderPaymentRequest>,
) -> Result<Json<Order>, AppError> {
    let guest_orders = guest_orders(&session, user.as_ref()).await?;
    let order = PaymentService::new(state.pool(), state.stripe())
        .confirm_order_payment(caller(user.as_ref(), &guest_orders), body.order_id)
        .await?;
    Ok(Json(order))
}

/// Stripe webhook. The raw body is needed to check the signature.
///
/// # Errors
///
/// Returns 400 for a missing or bad signature, 503 when payments aren't
/// configured.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    PaymentService::new(state.pool(), state.stripe())
        .handle_webhook(&body, signature)
        .await?;

    Ok(StatusCode::OK)
}

/// Orders a guest placed in this session; logged-in users don't need them.
async fn guest_orders(
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<Vec<OrderId>, AppError> {
    if user.is_some() {
        return Ok(Vec::new());
    }
    Ok(guest_order_ids(session).await?)
}

fn caller<'c>(user: Option<&CurrentUser>, guest_orders: &'c [OrderId]) -> PaymentCaller<'c> {
    user.map_or(PaymentCaller::Guest(guest_orders), |u| PaymentCaller::User(u.id))
}
