//! Product catalog handlers.
//!
//! Listing and detail are public and only show active products. Writes are
//! admin-only; deleting a product deactivates it so order history keeps
//! its reference.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{ProductId, Slug};

use crate::db::products::ProductRecord;
use crate::db::{CategoryRepository, Pagination, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Category, Page, Product, ProductFilter, ProductInput, ProductSort};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(index).post(create))
        // `{product}` is a slug for reads and an ID for writes
        .route("/api/products/{product}", get(show).put(update).delete(destroy))
}

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Category slug.
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductListQuery {
    fn into_filter(self) -> ProductFilter {
        ProductFilter {
            category: non_empty(self.category),
            search: non_empty(self.search),
            featured: self.featured,
            include_inactive: false,
            sort: self.sort,
            pagination: Pagination::new(self.page, self.per_page),
        }
    }
}

/// A product with the categories it belongs to.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub categories: Vec<Category>,
}

/// Filtered, paginated product listing.
///
/// # Errors
///
/// Returns 500 if the query fails.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Page<Product>>, AppError> {
    let page = ProductRepository::new(state.pool())
        .list(&query.into_filter())
        .await?;
    Ok(Json(page))
}

/// Product detail by slug.
///
/// # Errors
///
/// Returns 404 if no active product has this slug.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product '{slug}' not found")))?;

    Ok(Json(load_detail(&state, product).await?))
}

/// Create a product.
///
/// Without an explicit slug one is derived from the name, with a numeric
/// suffix if needed.
///
/// # Errors
///
/// Returns 400 for invalid fields, 409 if an explicit slug is taken or a
/// category doesn't exist.
#[instrument(skip(state, input), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductDetail>), AppError> {
    input.validate().map_err(AppError::BadRequest)?;

    let products = ProductRepository::new(state.pool());
    let slug = resolve_slug(&products, &input, None).await?;
    let product = products.create(&product_record(&input, slug)).await?;
    products.set_categories(product.id, &input.category_ids).await?;

    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");

    let detail = load_detail(&state, product).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Replace a product's editable fields and categories.
///
/// # Errors
///
/// Returns 400 for invalid fields, 404 if the product doesn't exist, 409 on
/// a slug or category conflict.
#[instrument(skip(state, input), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ProductDetail>, AppError> {
    input.validate().map_err(AppError::BadRequest)?;

    let products = ProductRepository::new(state.pool());
    let slug = resolve_slug(&products, &input, Some(id)).await?;
    let product = products.update(id, &product_record(&input, slug)).await?;
    products.set_categories(product.id, &input.category_ids).await?;

    tracing::info!(product_id = %product.id, "Product updated");

    Ok(Json(load_detail(&state, product).await?))
}

/// Deactivate a product.
///
/// # Errors
///
/// Returns 404 if the product doesn't exist.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    if !ProductRepository::new(state.pool()).soft_delete(id).await? {
        return Err(AppError::NotFound(format!("Product {id} not found")));
    }

    tracing::info!(product_id = %id, "Product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

async fn resolve_slug(
    products: &ProductRepository<'_>,
    input: &ProductInput,
    exclude: Option<ProductId>,
) -> Result<Slug, AppError> {
    match non_empty(input.slug.clone()) {
        // Explicit slugs are used as given
        Some(slug) => Slug::parse(&slug).map_err(|e| AppError::BadRequest(format!("slug: {e}"))),
        None => {
            let base =
                Slug::from_title(&input.name).map_err(|e| AppError::BadRequest(format!("name: {e}")))?;
            Ok(products.available_slug(&base, exclude).await?)
        }
    }
}

fn product_record(input: &ProductInput, slug: Slug) -> ProductRecord {
    ProductRecord {
        name: input.name.trim().to_owned(),
        slug,
        description: input.description.clone(),
        price: input.price,
        compare_at_price: input.compare_at_price,
        image_url: non_empty(input.image_url.clone()),
        images: input.images.clone(),
        inventory: input.inventory,
        is_active: input.is_active,
        is_featured: input.is_featured,
        affiliate_url: non_empty(input.affiliate_url.clone()),
    }
}

async fn load_detail(state: &AppState, product: Product) -> Result<ProductDetail, AppError> {
    let categories = CategoryRepository::new(state.pool())
        .list_for_product(product.id)
        .await?;
    Ok(ProductDetail {
        product,
        categories,
    })
}

/// `None` for missing or blank strings, trimmed otherwise.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query: ProductListQuery = serde_json::from_str("{}").unwrap();
        let filter = query.into_filter();
        assert_eq!(filter.pagination, Pagination::new(None, None));
        assert_eq!(filter.pagination.per_page, 20);
        assert_eq!(filter.sort, ProductSort::Newest);
        assert!(!filter.include_inactive);
    }

    #[test]
    fn test_list_query_clamps_and_drops_blank_filters() {
        let query = ProductListQuery {
            page: Some(0),
            per_page: Some(500),
            category: Some("  ".to_string()),
            search: Some(" mug ".to_string()),
            ..ProductListQuery::default()
        };
        let filter = query.into_filter();
        assert_eq!(filter.pagination.page, 1);
        assert_eq!(filter.pagination.per_page, 100);
        assert_eq!(filter.category, None);
        assert_eq!(filter.search.as_deref(), Some("mug"));
    }

    #[test]
    fn test_product_detail_flattens_product() {
        let json = serde_json::to_value(ProductDetail {
            product: Product {
                id: ProductId::new(7),
                name: "Blue Mug".to_string(),
                slug: Slug::parse("blue-mug").unwrap(),
                description: String::new(),
                price: "12.50".parse().unwrap(),
                compare_at_price: None,
                image_url: None,
                images: Vec::new(),
                inventory: 3,
                is_active: true,
                is_featured: false,
                supplier: None,
                supplier_sku: None,
                affiliate_url: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
            categories: Vec::new(),
        })
        .unwrap();

        assert_eq!(json["slug"], "blue-mug");
        assert_eq!(json["price"], "12.50");
        assert!(json["categories"].as_array().unwrap().is_empty());
    }
}
