//! Administrator management commands.
//!
//! # Usage
//!
//! ```bash
//! # The account must already exist (register through the shop first)
//! emporium admin grant -e admin@example.com
//! emporium admin revoke -e admin@example.com
//! ```

use thiserror::Error;

use emporium_core::{Email, EmailError};
use emporium_storefront::db::{RepositoryError, UserRepository};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No account with this email.
    #[error("No account with email: {0}")]
    UserNotFound(String),

    /// Query failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Grant or revoke admin rights on an existing account.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if nobody registered with `email`.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), AdminError> {
    let email = Email::parse(email)?;

    let pool = super::connect()
        .await
        .map_err(|e| AdminError::Connect(e.to_string()))?;

    let user = UserRepository::new(&pool)
        .set_admin(&email, is_admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    if user.is_admin {
        tracing::info!(user_id = %user.id, email = %user.email, "Admin rights granted");
    } else {
        tracing::info!(user_id = %user.id, email = %user.email, "Admin rights revoked");
    }

    Ok(())
}
