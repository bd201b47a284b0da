//! Wholesale2b dropship product feed.

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::Wholesale2bConfig;

use super::{ProductSource, SupplierProduct, SyncError, category_slug, parse_price, scoped_sku, with_retries};

const PAGE_SIZE: u32 = 100;
const SUPPLIER: &str = "wholesale2b";
const SKU_PREFIX: &str = "w2b";

/// Wholesale2b catalog feed.
pub struct Wholesale2bSource {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    max_pages: u32,
    max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    products: Vec<FeedProduct>,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct FeedProduct {
    sku: Option<String>,
    title: Option<String>,
    #[serde(default)]
    description: String,
    msrp: Option<FeedAmount>,
    price: Option<FeedAmount>,
    image: Option<String>,
    #[serde(default)]
    qty: i64,
    category: Option<String>,
}

/// The feed sends amounts as numbers or strings depending on the product.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedAmount {
    Number(serde_json::Number),
    Text(String),
}

impl FeedAmount {
    fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => n.to_string().parse().ok(),
            Self::Text(s) => parse_price(s),
        }
    }
}

impl Wholesale2bSource {
    /// Create a feed source.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new(config: &Wholesale2bConfig, max_pages: u32, max_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
            max_attempts,
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<FeedPage, SyncError> {
        let response = self
            .client
            .get(format!("{}/products", self.base_url))
            .header("X-Api-Key", self.api_key.expose_secret())
            .query(&[("page", page), ("per_page", PAGE_SIZE)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| SyncError::Parse(format!("Failed to parse Wholesale2b feed: {e}")))
    }
}

impl ProductSource for Wholesale2bSource {
    fn name(&self) -> &str {
        SUPPLIER
    }

    #[instrument(skip(self), fields(max_pages = self.max_pages))]
    async fn fetch_products(&self) -> Result<Vec<SupplierProduct>, SyncError> {
        let mut products = Vec::new();

        for page in 1..=self.max_pages {
            let feed = with_retries(self.max_attempts, "wholesale2b feed", || self.fetch_page(page)).await?;

            let count = feed.products.len();
            products.extend(feed.products.into_iter().map(into_supplier_product));
            debug!(page, count, total_pages = feed.total_pages, "Fetched Wholesale2b page");

            if count == 0 || page >= feed.total_pages {
                break;
            }
        }

        Ok(products)
    }
}

fn into_supplier_product(item: FeedProduct) -> SupplierProduct {
    let price = item
        .msrp
        .as_ref()
        .and_then(FeedAmount::to_decimal)
        .filter(|p| *p > Decimal::ZERO)
        .or_else(|| item.price.as_ref().and_then(FeedAmount::to_decimal))
        .unwrap_or(Decimal::ZERO);

    SupplierProduct {
        supplier: SUPPLIER.to_string(),
        supplier_sku: scoped_sku(SKU_PREFIX, item.sku.as_deref().unwrap_or_default()),
        name: item.title.unwrap_or_default(),
        description: item.description,
        price,
        compare_at_price: None,
        image_url: item.image,
        affiliate_url: None,
        inventory: i32::try_from(item.qty.max(0)).unwrap_or(i32::MAX),
        category_slug: category_slug(item.category.as_deref()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FEED_JSON: &str = r#"{
        "page": 1,
        "total_pages": 2,
        "products": [
            {
                "sku": "LAMP-01",
                "title": "Desk Lamp",
                "description": "Adjustable LED lamp",
                "msrp": "34.99",
                "price": 18.5,
                "image": "https://cdn.w2b.test/lamp.jpg",
                "qty": 42,
                "category": "Home Office"
            },
            {
                "sku": "  ",
                "title": "Mystery Item",
                "price": 9.99,
                "qty": -3
            }
        ]
    }"#;

    #[test]
    fn test_parse_feed_page() {
        let page: FeedPage = serde_json::from_str(FEED_JSON).unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.products.len(), 2);
    }

    #[test]
    fn test_msrp_preferred_over_wholesale_price() {
        let page: FeedPage = serde_json::from_str(FEED_JSON).unwrap();
        let lamp = into_supplier_product(page.products.into_iter().next().unwrap());

        assert_eq!(lamp.supplier_sku, "w2b-LAMP-01");
        assert_eq!(lamp.name, "Desk Lamp");
        assert_eq!(lamp.price, "34.99".parse::<Decimal>().unwrap());
        assert_eq!(lamp.inventory, 42);
        assert_eq!(lamp.category_slug.as_deref(), Some("home-office"));
        assert_eq!(lamp.affiliate_url, None);
    }

    #[test]
    fn test_missing_sku_left_empty() {
        let page: FeedPage = serde_json::from_str(FEED_JSON).unwrap();
        let item = into_supplier_product(page.products.into_iter().nth(1).unwrap());

        assert!(item.supplier_sku.is_empty());
        assert_eq!(item.price, "9.99".parse::<Decimal>().unwrap());
        assert_eq!(item.inventory, 0);
        assert!(crate::sync::normalize(item).is_none());
    }
}
