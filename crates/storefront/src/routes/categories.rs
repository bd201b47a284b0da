//! Category handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{CategoryId, Slug};

use crate::db::categories::CategoryRecord;
use crate::db::{CategoryRepository, Pagination, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput, Page, Product, ProductFilter, ProductSort};
use crate::routes::products::non_empty;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(index).post(create))
        // `{category}` is a slug for reads and an ID for writes
        .route(
            "/api/categories/{category}",
            get(show).put(update).delete(destroy),
        )
}

/// Paging and sort for the products of a category.
#[derive(Debug, Deserialize)]
pub struct CategoryProductsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub sort: ProductSort,
}

/// A category with one page of its active products.
#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    pub category: Category,
    pub products: Page<Product>,
}

/// All categories, alphabetically.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

/// A category and its products.
///
/// # Errors
///
/// Returns 404 if the category doesn't exist.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<CategoryProductsQuery>,
) -> Result<Json<CategoryDetail>, AppError> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category '{slug}' not found")))?;

    let filter = ProductFilter {
        category: Some(category.slug.to_string()),
        sort: query.sort,
        pagination: Pagination::new(query.page, query.per_page),
        ..ProductFilter::default()
    };
    let products = ProductRepository::new(state.pool()).list(&filter).await?;

    Ok(Json(CategoryDetail { category, products }))
}

/// Create a category.
///
/// # Errors
///
/// Returns 400 for a blank name or bad slug, 409 if the slug is taken.
#[instrument(skip(state, input), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let record = category_record(input)?;
    let category = CategoryRepository::new(state.pool()).create(&record).await?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Update a category.
///
/// # Errors
///
/// Returns 400 for invalid fields, 404 if the category doesn't exist, 409 if
/// the slug is taken or the category would be its own parent.
#[instrument(skip(state, input), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    let record = category_record(input)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &record)
        .await?;

    tracing::info!(category_id = %category.id, "Category updated");
    Ok(Json(category))
}

/// Delete a category. Its products are kept.
///
/// # Errors
///
/// Returns 404 if the category doesn't exist.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    if !CategoryRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound(format!("Category {id} not found")));
    }

    tracing::info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn category_record(input: CategoryInput) -> Result<CategoryRecord, AppError> {
    let name = input.name.trim().to_owned();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let slug = match non_empty(input.slug) {
        Some(slug) => Slug::parse(&slug),
        None => Slug::from_title(&name),
    }
    .map_err(|e| AppError::BadRequest(format!("slug: {e}")))?;

    Ok(CategoryRecord {
        name,
        slug,
        description: non_empty(input.description),
        image_url: non_empty(input.image_url),
        parent_id: input.parent_id,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str, slug: Option<&str>) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            slug: slug.map(String::from),
            description: Some("   ".to_string()),
            image_url: None,
            parent_id: None,
        }
    }

    #[test]
    fn test_category_record_derives_slug() {
        let record = category_record(input(" Kitchen & Dining ", None)).unwrap();
        assert_eq!(record.name, "Kitchen & Dining");
        assert_eq!(record.slug.as_str(), "kitchen-dining");
        assert_eq!(record.description, None);
    }

    #[test]
    fn test_category_record_rejects_bad_input() {
        assert!(matches!(
            category_record(input("  ", None)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            category_record(input("Kitchen", Some("Not A Slug"))),
            Err(AppError::BadRequest(_))
        ));
    }
}
