//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; the response body is always `{"error": "..."}`.
//!
//! Service errors convert into `AppError` through the `From` impls below,
//! which decide the status code for each failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::chat::ChatError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;
use crate::services::referrals::ReferralError;
use crate::sync::SyncError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not enough stock to satisfy the request.
    #[error("Insufficient inventory: {0}")]
    InsufficientInventory(String),

    /// Payment provider or supplier API failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Optional integration is not configured.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_))
            | Self::Conflict(_)
            | Self::InsufficientInventory(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::ExternalService(_) => "External service error".to_string(),
            Self::NotConfigured(what) => format!("{what} is not available"),
            Self::RateLimited => "Too many requests, please slow down".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::InsufficientInventory(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail(_) => Self::BadRequest("Invalid email address".to_string()),
            AuthError::InvalidUsername(msg) | AuthError::WeakPassword(msg) => Self::BadRequest(msg),
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            AuthError::UserAlreadyExists => Self::Conflict(
                "An account with this email or username already exists".to_string(),
            ),
            AuthError::Repository(e) => Self::Database(e),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_string()),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity(msg) => Self::BadRequest(msg),
            CartError::ProductNotFound => Self::NotFound("Product not found".to_string()),
            CartError::ItemNotFound => Self::NotFound("Item not in cart".to_string()),
            CartError::ProductUnavailable => {
                Self::Conflict("Product is not available".to_string())
            }
            e @ CartError::InsufficientInventory { .. } => {
                Self::InsufficientInventory(capitalize(&e.to_string()))
            }
            CartError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::BadRequest("Cart is empty".to_string()),
            CheckoutError::Validation(msg) => Self::BadRequest(msg),
            CheckoutError::OrderNotFound => Self::NotFound("Order not found".to_string()),
            e @ CheckoutError::InsufficientInventory { .. } => {
                Self::InsufficientInventory(capitalize(&e.to_string()))
            }
            e @ (CheckoutError::ProductUnavailable(_)
            | CheckoutError::PriceChanged { .. }
            | CheckoutError::NotCancellable
            | CheckoutError::InvalidTransition { .. }
            | CheckoutError::DiscountAlreadyUsed) => Self::Conflict(capitalize(&e.to_string())),
            CheckoutError::PaymentsNotConfigured => Self::NotConfigured("Payments".to_string()),
            CheckoutError::PaymentProvider(e) => Self::ExternalService(e.to_string()),
            CheckoutError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<ReferralError> for AppError {
    fn from(err: ReferralError) -> Self {
        match err {
            ReferralError::NotFound => Self::NotFound("Referral code not found".to_string()),
            e @ ReferralError::AlreadyRedeemed => Self::Conflict(capitalize(&e.to_string())),
            e @ (ReferralError::NotRedeemable | ReferralError::SelfReferral) => {
                Self::BadRequest(capitalize(&e.to_string()))
            }
            ReferralError::Invalid(msg) => Self::BadRequest(msg),
            ReferralError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => Self::NotConfigured("Payments".to_string()),
            PaymentError::OrderNotFound => Self::NotFound("Order not found".to_string()),
            PaymentError::NotPayable(msg) => Self::Conflict(msg),
            PaymentError::InvalidWebhook(msg) => Self::BadRequest(format!("Invalid webhook: {msg}")),
            PaymentError::Stripe(e) => Self::ExternalService(e.to_string()),
            PaymentError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidMessage(msg) => Self::BadRequest(capitalize(&msg)),
            ChatError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotConfigured(what) => Self::NotConfigured(what),
            e @ (SyncError::Http(_) | SyncError::Api { .. }) => Self::ExternalService(e.to_string()),
            SyncError::Parse(msg) => Self::BadRequest(msg),
            SyncError::Io(e) => Self::Internal(e.to_string()),
            SyncError::Repository(e) => Self::Database(e),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::ProductId;

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            get_status(AppError::InsufficientInventory("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(AppError::ExternalService("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            get_status(AppError::NotConfigured("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_error_status() {
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Conflict("slug taken".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_service_error_status() {
        assert_eq!(get_status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(get_status(CartError::ProductNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(CartError::InsufficientInventory {
                product_id: ProductId::new(1),
                available: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(CheckoutError::NotCancellable), StatusCode::CONFLICT);
        assert_eq!(get_status(CheckoutError::DiscountAlreadyUsed), StatusCode::CONFLICT);
        assert_eq!(get_status(ReferralError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(get_status(ReferralError::SelfReferral), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(PaymentError::NotConfigured), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            get_status(ChatError::InvalidMessage("too long".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(SyncError::NotConfigured("rakuten".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = AppError::from(CartError::InsufficientInventory {
            product_id: ProductId::new(7),
            available: 3,
        })
        .into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Only 3 left in stock" }));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("connection string leaked".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("cart is empty"), "Cart is empty");
        assert_eq!(capitalize(""), "");
    }
}
