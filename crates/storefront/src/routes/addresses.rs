//! Saved address handlers. Every address belongs to the logged-in user.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};

use emporium_core::AddressId;

use crate::db::AddressRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/addresses", get(index).post(create))
        .route("/api/addresses/{id}", put(update).delete(destroy))
        .route("/api/addresses/{id}/default", post(set_default))
}

/// The user's addresses, defaults first.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Address>>, AppError> {
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(addresses))
}

/// Save a new address. The first address of a type becomes its default.
///
/// # Errors
///
/// Returns 400 when a required field is blank.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    input.validate().map_err(AppError::BadRequest)?;

    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Replace an address.
///
/// # Errors
///
/// Returns 400 when a required field is blank, 404 if the address isn't the
/// user's.
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>, AppError> {
    input.validate().map_err(AppError::BadRequest)?;

    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await?;
    Ok(Json(address))
}

/// Delete an address.
///
/// # Errors
///
/// Returns 404 if the address isn't the user's.
pub async fn destroy(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, AppError> {
    if !AddressRepository::new(state.pool()).delete(user.id, id).await? {
        return Err(AppError::NotFound("Address not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Make an address the default for its type.
///
/// # Errors
///
/// Returns 404 if the address isn't the user's.
pub async fn set_default(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>, AppError> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(Json(address))
}
