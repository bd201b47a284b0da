//! Supplier catalog sync.
//!
//! # Architecture
//!
//! - Each supplier implements [`ProductSource`] and returns normalized
//!   [`SupplierProduct`]s
//! - [`run_sync`] validates every product and upserts it keyed on
//!   `supplier_sku`, so running a sync twice updates rows in place
//! - A bad product is logged, counted and skipped; only a failed fetch
//!   aborts the run
//!
//! # Sources
//!
//! - [`RakutenSource`] - Rakuten Advertising product search (XML)
//! - [`Wholesale2bSource`] - Wholesale2b product feed (JSON)
//! - [`SampleCatalog`] - Built-in or YAML sample catalog for development
//! - [`scrape_product_page`] - Single product page via Open Graph tags

mod page;
mod rakuten;
mod sample;
mod wholesale2b;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use emporium_core::Slug;

use crate::db::{ProductRepository, RepositoryError, products::UpsertOutcome};

pub use page::{parse_product_page, scrape_product_page};
pub use rakuten::RakutenSource;
pub use sample::{SampleCatalog, SampleCategory};
pub use wholesale2b::Wholesale2bSource;

/// Stock assigned to products we sell through a supplier link and do not
/// hold ourselves.
pub const AFFILIATE_INVENTORY: i32 = 100;

/// Delay before the first retry; later retries wait proportionally longer.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Longest product name kept on import.
const MAX_NAME_CHARS: usize = 255;

/// Errors that can occur while syncing a supplier catalog.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supplier API returned a non-success status.
    #[error("supplier API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Supplier response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Supplier credentials are missing.
    #[error("supplier not configured: {0}")]
    NotConfigured(String),

    /// Reading a local catalog file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SyncError {
    /// Whether the failed call is worth repeating.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A product as delivered by a supplier, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierProduct {
    pub supplier: String,
    pub supplier_sku: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub affiliate_url: Option<String>,
    pub inventory: i32,
    /// Slug of an existing category to file the product under.
    pub category_slug: Option<String>,
}

/// Counts from one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {}, created {}, updated {}, skipped {}, failed {}",
            self.fetched, self.created, self.updated, self.skipped, self.failed
        )
    }
}

/// A supplier catalog.
pub trait ProductSource {
    /// Supplier name stored on imported products.
    fn name(&self) -> &str;

    /// Fetch the supplier's products.
    fn fetch_products(&self) -> impl Future<Output = Result<Vec<SupplierProduct>, SyncError>> + Send;
}

/// Run `op` up to `max_attempts` times, sleeping a little longer after
/// each retryable failure.
///
/// # Errors
///
/// Returns the last error once attempts run out, or the first error that
/// is not retryable.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, what: &str, mut op: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = RETRY_BASE_DELAY * attempt;
                warn!(
                    what,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Supplier call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetch a supplier's catalog and upsert every valid product.
///
/// # Errors
///
/// Returns an error only if fetching fails. Per-product failures are
/// logged and counted in the report.
#[instrument(skip_all, fields(source = source.name()))]
pub async fn run_sync<S: ProductSource + Sync>(
    pool: &PgPool,
    source: &S,
) -> Result<SyncReport, SyncError> {
    let products = source.fetch_products().await?;
    let repo = ProductRepository::new(pool);

    let mut report = SyncReport {
        fetched: products.len(),
        ..SyncReport::default()
    };

    for raw in products {
        let Some(product) = normalize(raw) else {
            report.skipped += 1;
            continue;
        };

        match import_one(&repo, &product).await {
            Ok(UpsertOutcome::Created(_)) => report.created += 1,
            Ok(UpsertOutcome::Updated(_)) => report.updated += 1,
            Err(e) => {
                warn!(
                    supplier_sku = %product.supplier_sku,
                    error = %e,
                    "Failed to import supplier product"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        "Supplier sync finished"
    );

    Ok(report)
}

/// Upsert one validated product, picking a free slug for new rows.
///
/// # Errors
///
/// Returns an error if the name yields no slug or the database write fails.
pub async fn import_one(
    repo: &ProductRepository<'_>,
    product: &SupplierProduct,
) -> Result<UpsertOutcome, SyncError> {
    let base = Slug::from_title(&product.name)
        .map_err(|e| SyncError::Parse(format!("no slug for '{}': {e}", product.name)))?;
    let existing = repo.find_id_by_supplier_sku(&product.supplier_sku).await?;
    let slug = repo.available_slug(&base, existing).await?;
    Ok(repo.upsert_by_supplier_sku(product, &slug).await?)
}

/// Trim a supplier product and reject what can't be sold.
///
/// Returns `None` for an empty SKU or name, or a non-positive price.
#[must_use]
pub fn normalize(mut product: SupplierProduct) -> Option<SupplierProduct> {
    product.supplier_sku = product.supplier_sku.trim().to_owned();
    product.name = product.name.trim().chars().take(MAX_NAME_CHARS).collect();
    product.description = product.description.trim().to_owned();

    if product.supplier_sku.is_empty() || product.name.is_empty() {
        return None;
    }
    if product.price <= Decimal::ZERO {
        return None;
    }

    product.price = product.price.round_dp(2);
    product.compare_at_price = product
        .compare_at_price
        .map(|p| p.round_dp(2))
        .filter(|p| *p > product.price);
    product.image_url = non_empty(product.image_url);
    product.affiliate_url = non_empty(product.affiliate_url);
    product.category_slug = non_empty(product.category_slug);
    product.inventory = product.inventory.max(0);

    Some(product)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Parse a supplier price string such as `"19.99"` or `"$1,299.00"`.
pub(crate) fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Prefix a supplier SKU so SKUs from different suppliers never collide.
///
/// An empty SKU stays empty so [`normalize`] still rejects it.
pub(crate) fn scoped_sku(prefix: &str, sku: &str) -> String {
    let sku = sku.trim();
    if sku.is_empty() {
        String::new()
    } else {
        format!("{prefix}-{sku}")
    }
}

/// Slug for a supplier's category name, if it yields one.
pub(crate) fn category_slug(name: Option<&str>) -> Option<String> {
    name.and_then(|n| Slug::from_title(n).ok())
        .map(|s| s.as_str().to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn product() -> SupplierProduct {
        SupplierProduct {
            supplier: "test".to_string(),
            supplier_sku: " SKU-1 ".to_string(),
            name: "  Ceramic Mug ".to_string(),
            description: " A mug. ".to_string(),
            price: "12.499".parse().unwrap(),
            compare_at_price: Some("15".parse().unwrap()),
            image_url: Some("  ".to_string()),
            affiliate_url: Some("https://supplier.test/mug".to_string()),
            inventory: -4,
            category_slug: None,
        }
    }

    #[test]
    fn test_normalize_trims_and_rounds() {
        let p = normalize(product()).unwrap();
        assert_eq!(p.supplier_sku, "SKU-1");
        assert_eq!(p.name, "Ceramic Mug");
        assert_eq!(p.description, "A mug.");
        assert_eq!(p.price, "12.50".parse::<Decimal>().unwrap());
        assert_eq!(p.compare_at_price, Some("15".parse().unwrap()));
        assert_eq!(p.image_url, None);
        assert_eq!(p.inventory, 0);
    }

    #[test]
    fn test_normalize_rejects_unsellable() {
        let mut p = product();
        p.supplier_sku = "   ".to_string();
        assert!(normalize(p).is_none());

        let mut p = product();
        p.name = String::new();
        assert!(normalize(p).is_none());

        let mut p = product();
        p.price = Decimal::ZERO;
        assert!(normalize(p).is_none());
    }

    #[test]
    fn test_normalize_drops_compare_at_not_above_price() {
        let mut p = product();
        p.compare_at_price = Some("10".parse().unwrap());
        assert_eq!(normalize(p).unwrap().compare_at_price, None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("19.99"), Some("19.99".parse().unwrap()));
        assert_eq!(parse_price(" $1,299.00 "), Some("1299.00".parse().unwrap()));
        assert_eq!(parse_price("n/a"), None);
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug(Some("Home & Kitchen")).as_deref(), Some("home-kitchen"));
        assert_eq!(category_slug(None), None);
    }

    #[test]
    fn test_report_display() {
        let report = SyncReport {
            fetched: 5,
            created: 2,
            updated: 1,
            skipped: 1,
            failed: 1,
        };
        assert_eq!(
            report.to_string(),
            "fetched 5, created 2, updated 1, skipped 1, failed 1"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(SyncError::Api { status: 429, message: String::new() }.is_retryable());
        assert!(!SyncError::Api { status: 404, message: String::new() }.is_retryable());
        assert!(!SyncError::Parse("bad".to_string()).is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retries_recovers() {
        let calls = AtomicU32::new(0);
        let result = with_retries(3, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SyncError::Api { status: 502, message: String::new() })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retries_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(2, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Api { status: 500, message: String::new() })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retries_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(5, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Parse("bad".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
