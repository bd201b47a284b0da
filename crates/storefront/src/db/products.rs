//! Product repository.
//!
//! Listings are assembled with `sqlx::QueryBuilder` so optional filters bind
//! parameters instead of splicing user input into SQL. Supplier imports go
//! through [`ProductRepository::upsert_by_supplier_sku`], keyed on the
//! supplier's SKU so repeated syncs update rows in place.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use emporium_core::{CategoryId, ProductId, Slug};

use super::RepositoryError;
use crate::models::{Page, Product, ProductFilter};
use crate::sync::SupplierProduct;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price, p.compare_at_price, \
     p.image_url, p.images, p.inventory, p.is_active, p.is_featured, p.supplier, \
     p.supplier_sku, p.affiliate_url, p.created_at, p.updated_at";

/// Upper bound on numeric suffixes tried before giving up on a slug.
const MAX_SLUG_SUFFIX: u32 = 1000;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    image_url: Option<String>,
    images: Vec<String>,
    inventory: i32,
    is_active: bool,
    is_featured: bool,
    supplier: Option<String>,
    supplier_sku: Option<String>,
    affiliate_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&r.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;

        Ok(Self {
            id: r.id,
            name: r.name,
            slug,
            description: r.description,
            price: r.price,
            compare_at_price: r.compare_at_price,
            image_url: r.image_url,
            images: r.images,
            inventory: r.inventory,
            is_active: r.is_active,
            is_featured: r.is_featured,
            supplier: r.supplier,
            supplier_sku: r.supplier_sku,
            affiliate_url: r.affiliate_url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated product fields ready to write.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub inventory: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub affiliate_url: Option<String>,
}

/// Result of a supplier upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(ProductId),
    Updated(ProductId),
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
    id: ProductId,
    inserted: bool,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError> {
        let mut count_query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM storefront.product p");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product p"));
        push_filters(&mut query, filter);
        query.push(filter.sort.order_by());
        query.push(" LIMIT ");
        query.push_bind(filter.pagination.limit());
        query.push(" OFFSET ");
        query.push_bind(filter.pagination.offset());

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total, filter.pagination))
    }

    /// Get a product by ID, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product p \
             WHERE p.slug = $1 AND (p.is_active OR $2)"
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Active products whose name or description mentions any keyword.
    ///
    /// Used to ground the support chat in real catalog entries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_active(
        &self,
        keywords: &[String],
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let patterns: Vec<String> = keywords
            .iter()
            .map(|k| format!("%{}%", escape_like(k)))
            .collect();

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product p \
             WHERE p.is_active \
               AND (p.name ILIKE ANY($1) OR p.description ILIKE ANY($1)) \
             ORDER BY p.is_featured DESC, p.inventory > 0 DESC, p.created_at DESC \
             LIMIT $2"
        ))
        .bind(&patterns)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Find a free slug starting from `base`, appending `-2`, `-3`, ...
    ///
    /// `exclude` lets an update keep its own slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no suffix is free.
    pub async fn available_slug(
        &self,
        base: &Slug,
        exclude: Option<ProductId>,
    ) -> Result<Slug, RepositoryError> {
        let pattern = format!("{}-%", escape_like(base.as_str()));
        let taken: Vec<String> = sqlx::query_scalar(
            r"
            SELECT slug FROM storefront.product
            WHERE (slug = $1 OR slug LIKE $2)
              AND ($3::INTEGER IS NULL OR id <> $3)
            ",
        )
        .bind(base.as_str())
        .bind(&pattern)
        .bind(exclude)
        .fetch_all(self.pool)
        .await?;

        let taken: HashSet<String> = taken.into_iter().collect();
        next_free_slug(base, &taken)
            .ok_or_else(|| RepositoryError::Conflict(format!("no free slug for '{base}'")))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, record: &ProductRecord) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO storefront.product AS p \
                (name, slug, description, price, compare_at_price, image_url, images, \
                 inventory, is_active, is_featured, affiliate_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&record.name)
        .bind(record.slug.as_str())
        .bind(&record.description)
        .bind(record.price)
        .bind(record.compare_at_price)
        .bind(&record.image_url)
        .bind(&record.images)
        .bind(record.inventory)
        .bind(record.is_active)
        .bind(record.is_featured)
        .bind(&record.affiliate_url)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product slug already exists"))?;

        Product::try_from(row)
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        record: &ProductRecord,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE storefront.product AS p SET \
                name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6, \
                image_url = $7, images = $8, inventory = $9, is_active = $10, \
                is_featured = $11, affiliate_url = $12, updated_at = NOW() \
             WHERE p.id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&record.name)
        .bind(record.slug.as_str())
        .bind(&record.description)
        .bind(record.price)
        .bind(record.compare_at_price)
        .bind(&record.image_url)
        .bind(&record.images)
        .bind(record.inventory)
        .bind(record.is_active)
        .bind(record.is_featured)
        .bind(&record.affiliate_url)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }

    /// Hide a product from the storefront without deleting order history.
    ///
    /// # Returns
    ///
    /// Returns `true` if a product was deactivated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn soft_delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.product SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the set of categories a product belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a category doesn't exist.
    pub async fn set_categories(
        &self,
        id: ProductId,
        category_ids: &[CategoryId],
    ) -> Result<(), RepositoryError> {
        let ids: Vec<i32> = category_ids.iter().map(CategoryId::as_i32).collect();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM storefront.product_category WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO storefront.product_category (product_id, category_id)
            SELECT $1, UNNEST($2::INTEGER[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict("unknown category".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert or update a product imported from a supplier.
    ///
    /// Matches on `supplier_sku`. Updates refresh supplier-owned fields
    /// (price, description, images, stock) but keep the slug and the
    /// merchandising flags set by admins. `slug` is only used on insert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug collides on insert.
    pub async fn upsert_by_supplier_sku(
        &self,
        product: &SupplierProduct,
        slug: &Slug,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let images: Vec<String> = product.image_url.iter().cloned().collect();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UpsertRow>(
            r"
            INSERT INTO storefront.product
                (name, slug, description, price, compare_at_price, image_url, images,
                 inventory, supplier, supplier_sku, affiliate_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (supplier_sku) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                image_url = COALESCE(EXCLUDED.image_url, storefront.product.image_url),
                images = CASE WHEN cardinality(EXCLUDED.images) > 0
                              THEN EXCLUDED.images ELSE storefront.product.images END,
                inventory = EXCLUDED.inventory,
                supplier = EXCLUDED.supplier,
                affiliate_url = COALESCE(EXCLUDED.affiliate_url, storefront.product.affiliate_url),
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            ",
        )
        .bind(&product.name)
        .bind(slug.as_str())
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(&product.image_url)
        .bind(&images)
        .bind(product.inventory)
        .bind(&product.supplier)
        .bind(&product.supplier_sku)
        .bind(&product.affiliate_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product slug already exists"))?;

        if let Some(category) = &product.category_slug {
            sqlx::query(
                r"
                INSERT INTO storefront.product_category (product_id, category_id)
                SELECT $1, id FROM storefront.category WHERE slug = $2
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(row.id)
            .bind(category)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(if row.inserted {
            UpsertOutcome::Created(row.id)
        } else {
            UpsertOutcome::Updated(row.id)
        })
    }

    /// Look up a product ID by supplier SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_id_by_supplier_sku(
        &self,
        supplier_sku: &str,
    ) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar("SELECT id FROM storefront.product WHERE supplier_sku = $1")
            .bind(supplier_sku)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }
}

/// Append `WHERE` clauses for a product filter.
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    query.push(" WHERE TRUE");

    if !filter.include_inactive {
        query.push(" AND p.is_active");
    }

    if let Some(featured) = filter.featured {
        query.push(" AND p.is_featured = ");
        query.push_bind(featured);
    }

    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        query.push(
            " AND EXISTS (SELECT 1 FROM storefront.product_category pc \
             JOIN storefront.category c ON c.id = pc.category_id \
             WHERE pc.product_id = p.id AND c.slug = ",
        );
        query.push_bind(category.to_owned());
        query.push(")");
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        query.push(" AND (p.name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// First of `base`, `base-2`, `base-3`, ... not in `taken`.
fn next_free_slug(base: &Slug, taken: &HashSet<String>) -> Option<Slug> {
    if !taken.contains(base.as_str()) {
        return Some(base.clone());
    }
    (2..=MAX_SLUG_SUFFIX)
        .map(|n| base.with_suffix(n))
        .find(|candidate| !taken.contains(candidate.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Pagination;
    use crate::models::ProductSort;

    #[test]
    fn test_next_free_slug_uses_base_when_free() {
        let base = Slug::parse("tea-kettle").unwrap();
        let taken = HashSet::new();
        assert_eq!(next_free_slug(&base, &taken).unwrap().as_str(), "tea-kettle");
    }

    #[test]
    fn test_next_free_slug_skips_taken_suffixes() {
        let base = Slug::parse("tea-kettle").unwrap();
        let taken: HashSet<String> = ["tea-kettle", "tea-kettle-2", "tea-kettle-3"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(next_free_slug(&base, &taken).unwrap().as_str(), "tea-kettle-4");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_cotton\\"), "100\\%\\_cotton\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_push_filters_binds_user_input() {
        let filter = ProductFilter {
            category: Some("kitchen".to_string()),
            search: Some("  mug ".to_string()),
            featured: Some(true),
            include_inactive: false,
            sort: ProductSort::Newest,
            pagination: Pagination::default(),
        };
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM storefront.product p");
        push_filters(&mut query, &filter);
        let sql = query.sql();

        assert!(sql.contains("p.is_active"));
        assert!(sql.contains("p.is_featured = $1"));
        assert!(sql.contains("c.slug = $2"));
        assert!(sql.contains("p.name ILIKE $3"));
        assert!(!sql.contains("mug"));
        assert!(!sql.contains("kitchen"));
    }

    #[test]
    fn test_push_filters_admin_sees_inactive() {
        let filter = ProductFilter {
            include_inactive: true,
            ..ProductFilter::default()
        };
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM storefront.product p");
        push_filters(&mut query, &filter);
        assert!(!query.sql().contains("is_active"));
    }
}
