//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;
pub mod sync;

use sqlx::PgPool;

use emporium_storefront::config::get_database_url;
use emporium_storefront::db;

/// Connect to the storefront database named by `STOREFRONT_DATABASE_URL`
/// (or `DATABASE_URL`), loading `.env` first.
///
/// # Errors
///
/// Returns an error if no URL is configured or the connection fails.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
