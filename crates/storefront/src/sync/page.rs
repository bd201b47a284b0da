//! Import a single product from its web page.
//!
//! Reads the Open Graph tags most shops emit (`og:title`, `og:description`,
//! `og:image`) plus a product price meta tag. Pages without a title or a
//! price are rejected.

use std::time::Duration;

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::instrument;
use url::Url;

use super::{AFFILIATE_INVENTORY, SupplierProduct, SyncError, parse_price, scoped_sku};

const SUPPLIER: &str = "scraper";
const SKU_PREFIX: &str = "scraped";
const SKU_HASH_CHARS: usize = 16;
const USER_AGENT: &str = concat!("emporium-catalog/", env!("CARGO_PKG_VERSION"));

const PRICE_SELECTORS: &[&str] = &[
    r#"meta[property="product:price:amount"]"#,
    r#"meta[property="og:price:amount"]"#,
    r#"meta[itemprop="price"]"#,
];

/// Fetch a product page and extract a [`SupplierProduct`] from it.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the request fails, or the page
/// lacks a title or price.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[instrument]
pub async fn scrape_product_page(url: &str) -> Result<SupplierProduct, SyncError> {
    let url = Url::parse(url).map_err(|e| SyncError::Parse(format!("Invalid URL: {e}")))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to build HTTP client");

    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Api {
            status: status.as_u16(),
            message: format!("GET {url} failed"),
        });
    }

    let html = response.text().await?;
    parse_product_page(&html, &url)
}

/// Extract a product from page HTML.
///
/// # Errors
///
/// Returns `SyncError::Parse` if the page has no title or no price.
pub fn parse_product_page(html: &str, url: &Url) -> Result<SupplierProduct, SyncError> {
    let document = Html::parse_document(html);

    let name = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| element_text(&document, "title"))
        .ok_or_else(|| SyncError::Parse(format!("No product title on {url}")))?;

    let price = PRICE_SELECTORS
        .iter()
        .find_map(|selector| meta_content(&document, selector))
        .and_then(|raw| parse_price(&raw))
        .ok_or_else(|| SyncError::Parse(format!("No price on {url}")))?;

    let description = meta_content(&document, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="description"]"#))
        .unwrap_or_default();

    let image_url = meta_content(&document, r#"meta[property="og:image"]"#)
        .and_then(|src| url.join(&src).ok())
        .map(String::from);

    Ok(SupplierProduct {
        supplier: SUPPLIER.to_string(),
        supplier_sku: scoped_sku(SKU_PREFIX, &url_hash(url)),
        name,
        description,
        price,
        compare_at_price: None,
        image_url,
        affiliate_url: Some(url.to_string()),
        inventory: AFFILIATE_INVENTORY,
        category_slug: None,
    })
}

/// Stable short hash of a page URL, used as its SKU.
fn url_hash(url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    digest.chars().take(SKU_HASH_CHARS).collect()
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(String::from)
}

fn element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Linen Apron | Shop</title>
  <meta property="og:title" content="Linen Apron">
  <meta property="og:description" content="Stonewashed linen apron with two pockets.">
  <meta property="og:image" content="/images/apron.jpg">
  <meta property="product:price:amount" content="32.00">
  <meta property="product:price:currency" content="USD">
</head>
<body><h1>Linen Apron</h1></body>
</html>"#;

    fn page_url() -> Url {
        Url::parse("https://maker.test/products/linen-apron").unwrap()
    }

    #[test]
    fn test_parse_open_graph_page() {
        let product = parse_product_page(PAGE, &page_url()).unwrap();

        assert_eq!(product.supplier, "scraper");
        assert_eq!(product.name, "Linen Apron");
        assert_eq!(product.description, "Stonewashed linen apron with two pockets.");
        assert_eq!(product.price, "32.00".parse::<Decimal>().unwrap());
        assert_eq!(
            product.image_url.as_deref(),
            Some("https://maker.test/images/apron.jpg")
        );
        assert_eq!(
            product.affiliate_url.as_deref(),
            Some("https://maker.test/products/linen-apron")
        );
    }

    #[test]
    fn test_sku_is_stable_per_url() {
        let a = parse_product_page(PAGE, &page_url()).unwrap();
        let b = parse_product_page(PAGE, &page_url()).unwrap();
        let other = parse_product_page(PAGE, &Url::parse("https://maker.test/p/2").unwrap()).unwrap();

        assert_eq!(a.supplier_sku, b.supplier_sku);
        assert_ne!(a.supplier_sku, other.supplier_sku);
        assert!(a.supplier_sku.starts_with("scraped-"));
        assert_eq!(a.supplier_sku.len(), "scraped-".len() + SKU_HASH_CHARS);
    }

    #[test]
    fn test_title_fallback_and_itemprop_price() {
        let html = r#"<html><head><title>
            Enamel   Pin
        </title><meta itemprop="price" content="$6.50"></head></html>"#;
        let product = parse_product_page(html, &page_url()).unwrap();

        assert_eq!(product.name, "Enamel Pin");
        assert_eq!(product.price, "6.50".parse::<Decimal>().unwrap());
        assert!(product.description.is_empty());
        assert!(product.image_url.is_none());
    }

    #[test]
    fn test_page_without_price_is_rejected() {
        let html = r#"<html><head><meta property="og:title" content="Poster"></head></html>"#;
        assert!(matches!(
            parse_product_page(html, &page_url()),
            Err(SyncError::Parse(_))
        ));
    }
}
