//! Supplier sync and page scraping commands.
//!
//! # Usage
//!
//! ```bash
//! emporium sync rakuten --keyword "camping stove" --max-pages 3
//! emporium sync wholesale2b --max-pages 5
//! emporium scrape https://shop.example.com/products/blue-mug
//! ```

use tracing::info;

use emporium_storefront::config::SyncConfig;
use emporium_storefront::db::ProductRepository;
use emporium_storefront::db::products::UpsertOutcome;
use emporium_storefront::sync::{
    RakutenSource, SyncError, SyncReport, Wholesale2bSource, import_one, normalize, run_sync,
    scrape_product_page,
};

/// Search Rakuten for `keyword` and import the results.
///
/// # Errors
///
/// Returns an error if Rakuten isn't configured or the search fails.
pub async fn rakuten(keyword: &str, max_pages: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::from_env()?;
    let rakuten = config.rakuten.as_ref().ok_or_else(|| {
        SyncError::NotConfigured(
            "Rakuten (set RAKUTEN_CLIENT_ID, RAKUTEN_CLIENT_SECRET and RAKUTEN_ACCOUNT_ID)"
                .to_owned(),
        )
    })?;

    let source = RakutenSource::new(rakuten, keyword, max_pages, config.max_attempts);
    let pool = super::connect().await?;

    info!(keyword, max_pages, "Starting Rakuten sync");
    print_report(&run_sync(&pool, &source).await?);
    Ok(())
}

/// Import the Wholesale2b feed.
///
/// # Errors
///
/// Returns an error if Wholesale2b isn't configured or the feed fails.
pub async fn wholesale2b(max_pages: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::from_env()?;
    let wholesale2b = config.wholesale2b.as_ref().ok_or_else(|| {
        SyncError::NotConfigured("Wholesale2b (set WHOLESALE2B_API_KEY)".to_owned())
    })?;

    let source = Wholesale2bSource::new(wholesale2b, max_pages, config.max_attempts);
    let pool = super::connect().await?;

    info!(max_pages, "Starting Wholesale2b sync");
    print_report(&run_sync(&pool, &source).await?);
    Ok(())
}

/// Scrape one product page and upsert it.
///
/// # Errors
///
/// Returns an error if the page can't be fetched or has no usable product.
pub async fn scrape(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let scraped = scrape_product_page(url).await?;
    let product = normalize(scraped)
        .ok_or_else(|| SyncError::Parse(format!("no name or price found on {url}")))?;

    let pool = super::connect().await?;
    let outcome = import_one(&ProductRepository::new(&pool), &product).await?;

    match outcome {
        UpsertOutcome::Created(id) => info!(product_id = %id, name = %product.name, "Product created"),
        UpsertOutcome::Updated(id) => info!(product_id = %id, name = %product.name, "Product updated"),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_report(report: &SyncReport) {
    println!("{report}");
}
