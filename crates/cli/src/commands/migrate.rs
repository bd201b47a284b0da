//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! emporium migrate
//! ```
//!
//! Runs the storefront schema migrations from `crates/storefront/migrations/`
//! (embedded at compile time) and then creates the session store table.

use tower_sessions_sqlx_store::PostgresStore;

use emporium_storefront::db;

/// Run storefront and session store migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
