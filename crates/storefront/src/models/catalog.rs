//! Catalog domain types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{CategoryId, ProductId, Slug};

use crate::db::Pagination;

/// A product category. Categories may nest one level via `parent_id`.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from `name` when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
}

/// A sellable product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    /// Original price shown struck through when on sale.
    pub compare_at_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    /// Units on hand, never negative.
    pub inventory: i32,
    pub is_active: bool,
    pub is_featured: bool,
    /// Supplier the product was imported from, if any.
    pub supplier: Option<String>,
    /// Supplier's identifier, the upsert key for catalog sync.
    pub supplier_sku: Option<String>,
    pub affiliate_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub const fn can_fulfill(&self, quantity: i32) -> bool {
        self.is_active && quantity >= 1 && quantity <= self.inventory
    }
}

/// Fields accepted when creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    /// Derived from `name` when omitted.
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub inventory: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    pub affiliate_url: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Check field-level invariants.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("price cannot be negative".to_string());
        }
        if self.compare_at_price.is_some_and(|p| p.is_sign_negative()) {
            return Err("compare_at_price cannot be negative".to_string());
        }
        if self.inventory < 0 {
            return Err("inventory cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// `ORDER BY` clause for this sort, with `id` as a stable tiebreaker.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            Self::PriceAsc => " ORDER BY p.price ASC, p.id ASC",
            Self::PriceDesc => " ORDER BY p.price DESC, p.id DESC",
            Self::Name => " ORDER BY lower(p.name) ASC, p.id ASC",
        }
    }
}

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Only products in the category with this slug.
    pub category: Option<String>,
    /// Case-insensitive match against name and description.
    pub search: Option<String>,
    /// Only featured products when `Some(true)`.
    pub featured: Option<bool>,
    /// Admin listings include deactivated products.
    pub include_inactive: bool,
    pub sort: ProductSort,
    pub pagination: Pagination,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let per_page = i64::from(pagination.per_page);
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_counts_partial_last_page() {
        let page = Page::new(vec![1, 2, 3], 41, Pagination::new(Some(3), Some(20)));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 3);

        let empty: Page<i32> = Page::new(Vec::new(), 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_product_sort_parses_query_values() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(sort.order_by().contains("p.price DESC"));
    }

    #[test]
    fn test_product_input_validation() {
        let mut input: ProductInput =
            serde_json::from_str(r#"{"name":"Desk Lamp","price":"24.00"}"#).unwrap();
        assert!(input.is_active);
        assert!(input.validate().is_ok());

        input.price = Decimal::new(-1, 0);
        assert!(input.validate().is_err());

        input.price = Decimal::ONE;
        input.name = "   ".to_string();
        assert_eq!(input.validate(), Err("name is required".to_string()));
    }
}
