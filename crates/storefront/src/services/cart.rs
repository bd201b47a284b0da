//! Cart service.
//!
//! Works on whichever cart the caller owns: the user's cart when logged in,
//! otherwise a guest cart keyed by the session's cart token. Quantities are
//! always at least one; removing a line is a separate operation.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::{ProductId, UserId};

pub use crate::db::carts::MAX_LINE_QUANTITY;
use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::{CartOwner, CartView};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    InvalidQuantity(String),

    #[error("product not found")]
    ProductNotFound,

    #[error("product is not available")]
    ProductUnavailable,

    #[error("only {available} left in stock")]
    InsufficientInventory { product_id: ProductId, available: i32 },

    #[error("item not in cart")]
    ItemNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for one request.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// The owner's cart. Owners without a cart get an empty view.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database query fails.
    pub async fn get(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let Some(cart_id) = self.carts.find(owner).await? else {
            return Ok(CartView::empty());
        };
        let items = self.carts.items(cart_id).await?;
        Ok(CartView::new(Some(cart_id), items))
    }

    /// Add a product, summing with any quantity already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for quantities outside `1..=999`,
    /// including when the summed line quantity would pass that bound.
    /// Returns `CartError::ProductNotFound` / `ProductUnavailable` for unknown
    /// or deactivated products.
    /// Returns `CartError::InsufficientInventory` if the resulting line
    /// quantity exceeds stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: Option<i32>,
    ) -> Result<CartView, CartError> {
        let quantity = validate_quantity(quantity.unwrap_or(1))?;

        let cart_id = self.carts.find_or_create(owner).await?;
        let existing = self
            .carts
            .quantity_of(cart_id, product_id)
            .await?
            .unwrap_or(0);

        let total = validate_quantity(existing.saturating_add(quantity))?;
        self.check_stock(product_id, total).await?;

        self.carts.add_item(cart_id, product_id, quantity).await?;

        let items = self.carts.items(cart_id).await?;
        Ok(CartView::new(Some(cart_id), items))
    }

    /// Replace a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for quantities below one, which
    /// includes zero.
    /// Returns `CartError::ItemNotFound` if the product isn't in the cart.
    /// Returns `CartError::InsufficientInventory` if stock is too low.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        let quantity = validate_quantity(quantity)?;

        let cart_id = self.carts.find(owner).await?.ok_or(CartError::ItemNotFound)?;
        self.check_stock(product_id, quantity).await?;

        self.carts
            .set_quantity(cart_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ItemNotFound,
                other => CartError::Repository(other),
            })?;

        let items = self.carts.items(cart_id).await?;
        Ok(CartView::new(Some(cart_id), items))
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the product isn't in the cart.
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
    ) -> Result<CartView, CartError> {
        let cart_id = self.carts.find(owner).await?.ok_or(CartError::ItemNotFound)?;

        if !self.carts.remove_item(cart_id, product_id).await? {
            return Err(CartError::ItemNotFound);
        }

        let items = self.carts.items(cart_id).await?;
        Ok(CartView::new(Some(cart_id), items))
    }

    /// Empty the cart. A missing cart is already empty.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database query fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let Some(cart_id) = self.carts.find(owner).await? else {
            return Ok(CartView::empty());
        };
        self.carts.clear(cart_id).await?;
        Ok(CartView::new(Some(cart_id), Vec::new()))
    }

    /// Fold a guest cart into a user's cart after login.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the merge transaction fails.
    #[instrument(skip(self, guest_token))]
    pub async fn merge_guest_cart(
        &self,
        guest_token: &str,
        user_id: UserId,
    ) -> Result<(), CartError> {
        self.carts.merge_guest_into_user(guest_token, user_id).await?;
        Ok(())
    }

    async fn check_stock(&self, product_id: ProductId, wanted: i32) -> Result<(), CartError> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        if !product.is_active {
            return Err(CartError::ProductUnavailable);
        }

        if !product.can_fulfill(wanted) {
            return Err(CartError::InsufficientInventory {
                product_id,
                available: product.inventory,
            });
        }

        Ok(())
    }
}

/// Reject quantities below one or above [`MAX_LINE_QUANTITY`].
fn validate_quantity(quantity: i32) -> Result<i32, CartError> {
    if quantity < 1 {
        return Err(CartError::InvalidQuantity(
            "quantity must be at least 1".to_owned(),
        ));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity(format!(
            "quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(matches!(
            validate_quantity(0),
            Err(CartError::InvalidQuantity(_))
        ));
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(validate_quantity(1).ok(), Some(1));
        assert_eq!(validate_quantity(MAX_LINE_QUANTITY).ok(), Some(MAX_LINE_QUANTITY));
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_summed_quantity_respects_line_cap() {
        let existing = MAX_LINE_QUANTITY - 1;
        assert_eq!(
            validate_quantity(existing.saturating_add(1)).ok(),
            Some(MAX_LINE_QUANTITY)
        );
        assert!(validate_quantity(existing.saturating_add(2)).is_err());
        assert!(validate_quantity(i32::MAX.saturating_add(1)).is_err());
    }

    #[test]
    fn test_inventory_error_message() {
        let err = CartError::InsufficientInventory {
            product_id: ProductId::new(4),
            available: 2,
        };
        assert_eq!(err.to_string(), "only 2 left in stock");
    }
}
