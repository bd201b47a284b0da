//! Cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use emporium_core::{CartId, LineAmount, ProductId, Slug, UserId, round_currency};

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    /// A logged-in user; at most one cart per user.
    User(UserId),
    /// An anonymous visitor, keyed by a random token kept in the session.
    Guest(String),
}

/// A cart line joined with the current product row.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub image_url: Option<String>,
    /// Current catalog price, not a snapshot.
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Units on hand, so the client can cap its quantity picker.
    pub inventory: i32,
    pub is_active: bool,
}

impl CartLine {
    #[must_use]
    pub const fn amount(&self) -> LineAmount {
        LineAmount {
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

/// The caller's cart as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Option<CartId>,
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl CartView {
    /// Summarize a set of lines.
    #[must_use]
    pub fn new(id: Option<CartId>, items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = round_currency(items.iter().map(|l| l.line_total).sum());
        Self {
            id,
            items,
            item_count,
            subtotal,
        }
    }

    /// An empty cart that has not been persisted yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(None, Vec::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: &str, quantity: i32) -> CartLine {
        let unit_price: Decimal = price.parse().unwrap();
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: Slug::parse(&format!("product-{id}")).unwrap(),
            image_url: None,
            unit_price,
            quantity,
            line_total: unit_price * Decimal::from(quantity),
            inventory: 10,
            is_active: true,
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::new(Some(CartId::new(1)), vec![line(1, "3.50", 2), line(2, "10.00", 1)]);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "17.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::empty();
        assert!(view.id.is_none());
        assert_eq!(view.item_count, 0);
        assert_eq!(view.subtotal, Decimal::ZERO);
    }
}
