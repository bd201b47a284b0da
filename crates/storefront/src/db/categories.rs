//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use emporium_core::{CategoryId, ProductId, Slug};

use super::RepositoryError;
use crate::models::Category;

const CATEGORY_COLUMNS: &str =
    "c.id, c.name, c.slug, c.description, c.image_url, c.parent_id, c.created_at, c.updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    parent_id: Option<CategoryId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(r: CategoryRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&r.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid category slug in database: {e}"))
        })?;

        Ok(Self {
            id: r.id,
            name: r.name,
            slug,
            description: r.description,
            image_url: r.image_url,
            parent_id: r.parent_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated category fields ready to write.
#[derive(Debug, Clone)]
pub struct CategoryRecord {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.category c ORDER BY lower(c.name), c.id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Category::try_from).collect()
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.category c WHERE c.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(Category::try_from).transpose()
    }

    /// Categories a product belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.category c \
             JOIN storefront.product_category pc ON pc.category_id = c.id \
             WHERE pc.product_id = $1 \
             ORDER BY lower(c.name)"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Category::try_from).collect()
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, record: &CategoryRecord) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO storefront.category AS c (name, slug, description, image_url, parent_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&record.name)
        .bind(record.slug.as_str())
        .bind(&record.description)
        .bind(&record.image_url)
        .bind(record.parent_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "category slug already exists"))?;

        Category::try_from(row)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        record: &CategoryRecord,
    ) -> Result<Category, RepositoryError> {
        if record.parent_id == Some(id) {
            return Err(RepositoryError::Conflict(
                "category cannot be its own parent".to_owned(),
            ));
        }

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE storefront.category AS c SET \
                name = $2, slug = $3, description = $4, image_url = $5, parent_id = $6, \
                updated_at = NOW() \
             WHERE c.id = $1 \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(&record.name)
        .bind(record.slug.as_str())
        .bind(&record.description)
        .bind(&record.image_url)
        .bind(record.parent_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "category slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Category::try_from(row)
    }

    /// Delete a category. Products stay; their links to it are removed.
    ///
    /// # Returns
    ///
    /// Returns `true` if the category was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
