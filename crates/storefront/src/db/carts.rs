//! Cart repository.
//!
//! A cart belongs to a user or to a guest session token, never both. Lines
//! are unique per product: adding a product already in the cart sums the
//! quantities.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use emporium_core::{CartId, ProductId, Slug, UserId, round_currency};

use super::RepositoryError;
use crate::models::{CartLine, CartOwner};

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: i32 = 999;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    slug: String,
    image_url: Option<String>,
    price: Decimal,
    quantity: i32,
    inventory: i32,
    is_active: bool,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(r: CartLineRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&r.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;

        Ok(Self {
            product_id: r.product_id,
            name: r.name,
            slug,
            image_url: r.image_url,
            unit_price: r.price,
            quantity: r.quantity,
            line_total: round_currency(r.price * Decimal::from(r.quantity)),
            inventory: r.inventory,
            is_active: r.is_active,
        })
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the owner's cart without creating one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<CartId>, RepositoryError> {
        let (user_id, token) = owner_columns(owner);
        let id = sqlx::query_scalar(
            r"
            SELECT id FROM storefront.cart
            WHERE ($1::INTEGER IS NOT NULL AND user_id = $1)
               OR ($2::TEXT IS NOT NULL AND session_token = $2)
            ",
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(id)
    }

    /// Find the owner's cart, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_or_create(&self, owner: &CartOwner) -> Result<CartId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = find_or_create_in(&mut tx, owner).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Cart lines joined with current product data, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.product_id, p.name, p.slug, p.image_url, p.price,
                   ci.quantity, p.inventory, p.is_active
            FROM storefront.cart_item ci
            JOIN storefront.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at ASC, ci.id ASC
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// Quantity of a product currently in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar(
            "SELECT quantity FROM storefront.cart_item WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(quantity)
    }

    /// Add units of a product, summing with an existing line.
    ///
    /// Returns the resulting line quantity, capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let total: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = LEAST(storefront.cart_item.quantity + EXCLUDED.quantity, $4),
                updated_at = NOW()
            RETURNING quantity
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_one(&mut *tx)
        .await?;

        touch_cart(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(total)
    }

    /// Set a line's quantity. Callers guarantee `quantity >= 1`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_item
            SET quantity = $3, updated_at = NOW()
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        touch_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a product from the cart.
    ///
    /// # Returns
    ///
    /// Returns `true` if a line was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Move a guest cart's lines into the user's cart and drop the guest cart.
    ///
    /// Quantities for products in both carts are summed up to
    /// [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn merge_guest_into_user(
        &self,
        session_token: &str,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest_id: Option<CartId> =
            sqlx::query_scalar("SELECT id FROM storefront.cart WHERE session_token = $1 FOR UPDATE")
                .bind(session_token)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(guest_id) = guest_id else {
            return Ok(());
        };

        let user_cart = find_or_create_in(&mut tx, &CartOwner::User(user_id)).await?;

        sqlx::query(
            r"
            INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
            SELECT $1, product_id, quantity FROM storefront.cart_item WHERE cart_id = $2
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = LEAST(storefront.cart_item.quantity + EXCLUDED.quantity, $3),
                updated_at = NOW()
            ",
        )
        .bind(user_cart)
        .bind(guest_id)
        .bind(MAX_LINE_QUANTITY)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM storefront.cart WHERE id = $1")
            .bind(guest_id)
            .execute(&mut *tx)
            .await?;

        touch_cart(&mut tx, user_cart).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Split an owner into the `(user_id, session_token)` column pair.
fn owner_columns(owner: &CartOwner) -> (Option<UserId>, Option<&str>) {
    match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Guest(token) => (None, Some(token.as_str())),
    }
}

async fn find_or_create_in(
    tx: &mut Transaction<'_, Postgres>,
    owner: &CartOwner,
) -> Result<CartId, RepositoryError> {
    let (user_id, token) = owner_columns(owner);

    sqlx::query(
        r"
        INSERT INTO storefront.cart (user_id, session_token)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(user_id)
    .bind(token)
    .execute(&mut **tx)
    .await?;

    let id = sqlx::query_scalar(
        r"
        SELECT id FROM storefront.cart
        WHERE ($1::INTEGER IS NOT NULL AND user_id = $1)
           OR ($2::TEXT IS NOT NULL AND session_token = $2)
        ",
    )
    .bind(user_id)
    .bind(token)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

async fn touch_cart(
    tx: &mut Transaction<'_, Postgres>,
    cart_id: CartId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE storefront.cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_columns() {
        assert_eq!(
            owner_columns(&CartOwner::User(UserId::new(5))),
            (Some(UserId::new(5)), None)
        );
        let guest = CartOwner::Guest("tok".to_string());
        assert_eq!(owner_columns(&guest), (None, Some("tok")));
    }
}
