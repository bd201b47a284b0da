//! Authentication route handlers.
//!
//! Email/password accounts stored in the storefront database. Logging in or
//! registering moves any guest cart from the session onto the account.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::{
    RequireAuth, auth_rate_limiter, clear_current_user, clear_guest_cart_token, guest_cart_token,
    set_current_user,
};
use crate::models::{CurrentUser, User};
use crate::services::{AuthService, CartService, Registration, ReferralService};
use crate::state::AppState;

/// Build the auth router. Only the credential endpoints are rate limited.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .layer(auth_rate_limiter())
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Referral code to redeem for a first-order discount.
    pub referral_code: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create an account and log it in.
///
/// A referral code is checked before the account is created so a typo
/// doesn't leave the user registered without their discount.
///
/// # Errors
///
/// Returns 400 for invalid fields or referral code, 409 if the email or
/// username is taken.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let referral_code = body
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    let referrals = ReferralService::new(state.pool());
    if let Some(code) = referral_code {
        referrals.validate(code).await?;
    }

    let user = AuthService::new(state.pool())
        .register(&Registration {
            email: &body.email,
            username: &body.username,
            password: &body.password,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;

    if let Some(code) = referral_code
        && let Err(e) = referrals.redeem(code, user.id).await
    {
        tracing::warn!(user_id = %user.id, error = %e, "Referral redemption failed after registration");
    }

    start_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password.
///
/// # Errors
///
/// Returns 401 for wrong credentials; the message never says which part was wrong.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    start_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(user))
}

/// Log out, discarding the whole session.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user's account.
///
/// # Errors
///
/// Returns 401 when not logged in or the account no longer exists.
pub async fn me(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))
}

/// Attach `user` to the session, bringing the guest cart along.
async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<(), AppError> {
    if let Some(token) = guest_cart_token(session).await? {
        match CartService::new(state.pool())
            .merge_guest_cart(&token, user.id)
            .await
        {
            Ok(()) => clear_guest_cart_token(session).await?,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to merge guest cart");
            }
        }
    }

    set_current_user(session, &CurrentUser::from(user)).await?;
    Ok(())
}
