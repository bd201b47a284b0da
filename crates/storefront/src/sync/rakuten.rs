//! Rakuten Advertising product search.
//!
//! Authentication exchanges a token key (base64 of `client_id:client_secret`)
//! for a short-lived bearer token scoped to the publisher account. The
//! search API answers in XML.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::RakutenConfig;

use super::{
    AFFILIATE_INVENTORY, ProductSource, SupplierProduct, SyncError, category_slug, parse_price,
    scoped_sku, with_retries,
};

const TOKEN_URL: &str = "https://api.linksynergy.com/token";
const SEARCH_URL: &str = "https://api.linksynergy.com/productsearch/1.0";
const PAGE_SIZE: u32 = 100;
const SUPPLIER: &str = "rakuten";

/// Rakuten product search for one keyword.
pub struct RakutenSource {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    account_id: String,
    keyword: String,
    max_pages: u32,
    max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "TotalPages", default)]
    total_pages: u32,
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    mid: Option<String>,
    sku: Option<String>,
    productname: Option<String>,
    category: Option<ItemCategory>,
    price: Option<Amount>,
    saleprice: Option<Amount>,
    description: Option<Description>,
    linkurl: Option<String>,
    imageurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemCategory {
    primary: Option<String>,
}

/// `<price currency="USD">19.99</price>`
#[derive(Debug, Deserialize)]
struct Amount {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Description {
    short: Option<String>,
    long: Option<String>,
}

impl RakutenSource {
    /// Create a search source.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new(
        config: &RakutenConfig,
        keyword: impl Into<String>,
        max_pages: u32,
        max_attempts: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            account_id: config.account_id.clone(),
            keyword: keyword.into(),
            max_pages: max_pages.max(1),
            max_attempts,
        }
    }

    async fn access_token(&self) -> Result<String, SyncError> {
        let token_key = BASE64.encode(format!(
            "{}:{}",
            self.client_id,
            self.client_secret.expose_secret()
        ));

        let response = self
            .client
            .post(TOKEN_URL)
            .bearer_auth(token_key)
            .form(&[("scope", self.account_id.as_str())])
            .send()
            .await?;

        let body = checked_body(response).await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::Parse(format!("Failed to parse token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn search_page(&self, token: &str, page: u32) -> Result<SearchResult, SyncError> {
        let response = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[
                ("keyword", self.keyword.clone()),
                ("max", PAGE_SIZE.to_string()),
                ("pagenumber", page.to_string()),
            ])
            .send()
            .await?;

        parse_search_result(&checked_body(response).await?)
    }
}

impl ProductSource for RakutenSource {
    fn name(&self) -> &str {
        SUPPLIER
    }

    #[instrument(skip(self), fields(keyword = %self.keyword, max_pages = self.max_pages))]
    async fn fetch_products(&self) -> Result<Vec<SupplierProduct>, SyncError> {
        let token = with_retries(self.max_attempts, "rakuten token", || self.access_token()).await?;

        let mut products = Vec::new();
        for page in 1..=self.max_pages {
            let result = with_retries(self.max_attempts, "rakuten search", || {
                self.search_page(&token, page)
            })
            .await?;

            let count = result.items.len();
            products.extend(result.items.into_iter().map(into_supplier_product));
            debug!(page, count, total_pages = result.total_pages, "Fetched Rakuten page");

            if count == 0 || page >= result.total_pages {
                break;
            }
        }

        Ok(products)
    }
}

async fn checked_body(response: reqwest::Response) -> Result<String, SyncError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(SyncError::Api {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        });
    }
    Ok(body)
}

fn parse_search_result(xml: &str) -> Result<SearchResult, SyncError> {
    quick_xml::de::from_str(xml)
        .map_err(|e| SyncError::Parse(format!("Failed to parse Rakuten XML: {e}")))
}

fn amount(value: Option<&Amount>) -> Option<Decimal> {
    value
        .and_then(|a| a.value.as_deref())
        .and_then(parse_price)
}

fn into_supplier_product(item: Item) -> SupplierProduct {
    let list_price = amount(item.price.as_ref());
    let sale_price = amount(item.saleprice.as_ref()).filter(|p| *p > Decimal::ZERO);

    let (price, compare_at_price) = match (list_price, sale_price) {
        (Some(list), Some(sale)) if sale < list => (sale, Some(list)),
        (Some(list), _) => (list, None),
        (None, Some(sale)) => (sale, None),
        (None, None) => (Decimal::ZERO, None),
    };

    let description = item
        .description
        .and_then(|d| d.long.filter(|l| !l.trim().is_empty()).or(d.short))
        .unwrap_or_default();

    let sku = match item.mid.as_deref() {
        Some(mid) if !mid.trim().is_empty() => {
            scoped_sku(&format!("{SUPPLIER}-{}", mid.trim()), item.sku.as_deref().unwrap_or_default())
        }
        _ => scoped_sku(SUPPLIER, item.sku.as_deref().unwrap_or_default()),
    };

    SupplierProduct {
        supplier: SUPPLIER.to_string(),
        supplier_sku: sku,
        name: item.productname.unwrap_or_default(),
        description,
        price,
        compare_at_price,
        image_url: item.imageurl,
        affiliate_url: item.linkurl,
        inventory: AFFILIATE_INVENTORY,
        category_slug: category_slug(item.category.and_then(|c| c.primary).as_deref()),
    }
}
