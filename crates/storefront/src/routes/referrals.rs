//! Referral code handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Referral;
use crate::services::{CodeOptions, ReferralService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/referrals", get(index).post(create))
        .route("/api/referrals/{code}", get(validate))
}

/// Body for a new referral code. Omitted fields use the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct CreateReferralRequest {
    pub discount_percent: Option<u8>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// What an anonymous visitor may learn about a code.
#[derive(Debug, Serialize)]
pub struct ReferralPreview {
    pub code: String,
    pub discount_percent: u8,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Referral> for ReferralPreview {
    fn from(r: Referral) -> Self {
        Self {
            code: r.code,
            discount_percent: r.discount_percent,
            expires_at: r.expires_at,
        }
    }
}

/// The user's referral codes.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Referral>>, AppError> {
    Ok(Json(ReferralService::new(state.pool()).list_mine(user.id).await?))
}

/// Create a referral code for the user.
///
/// # Errors
///
/// Returns 400 for out-of-range options.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CreateReferralRequest>,
) -> Result<(StatusCode, Json<Referral>), AppError> {
    let referral = ReferralService::new(state.pool())
        .create_code(
            user.id,
            CodeOptions {
                discount_percent: body.discount_percent,
                max_uses: body.max_uses,
                expires_at: body.expires_at,
            },
        )
        .await?;

    tracing::info!(referral_id = %referral.id, "Referral code created");
    Ok((StatusCode::CREATED, Json(referral)))
}

/// Check a code before registering with it.
///
/// # Errors
///
/// Returns 404 for unknown codes, 400 for expired or used-up ones.
pub async fn validate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ReferralPreview>, AppError> {
    let referral = ReferralService::new(state.pool()).validate(&code).await?;
    Ok(Json(referral.into()))
}
