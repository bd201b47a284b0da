//! Admin order management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{OrderId, OrderStatus};

use crate::db::Pagination;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Order, Page};
use crate::routes::orders::checkout_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/{id}/status", put(update_status))
}

/// Query parameters for the admin order list.
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Body for a status change.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

/// All orders, optionally filtered by status.
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn list_orders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Page<Order>>, AppError> {
    let page = checkout_service(&state)
        .admin_list(query.status, Pagination::new(query.page, query.per_page))
        .await?;
    Ok(Json(page))
}

/// Move an order to a new status. Cancelling restocks its items.
///
/// # Errors
///
/// Returns 404 for an unknown order, 409 if the lifecycle forbids the move.
#[instrument(skip(state, body), fields(admin_id = %admin.id, status = %body.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    let order = checkout_service(&state)
        .admin_update_status(id, body.status)
        .await?;
    Ok(Json(order))
}
