//! Order repository.
//!
//! Orders are written once, in a single transaction that also reserves
//! inventory and empties the cart. After that only the status columns and
//! the payment intent change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use thiserror::Error;

use emporium_core::{
    CartId, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, ReferralId, UserId,
};

use super::{Pagination, RepositoryError, referrals};
use crate::models::{
    AddressSnapshot, NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, Page,
};

const ORDER_COLUMNS: &str = "id, order_number, user_id, email, status, payment_status, \
     payment_intent_id, subtotal, discount_total, shipping_total, total, currency, \
     shipping_address, billing_address, referral_id, notes, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, unit_price, quantity, line_total";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    email: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_intent_id: Option<String>,
    subtotal: Decimal,
    discount_total: Decimal,
    shipping_total: Decimal,
    total: Decimal,
    currency: String,
    shipping_address: Json<AddressSnapshot>,
    billing_address: Option<Json<AddressSnapshot>>,
    referral_id: Option<ReferralId>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            order_number: r.order_number,
            user_id: r.user_id,
            email: r.email,
            status: r.status,
            payment_status: r.payment_status,
            payment_intent_id: r.payment_intent_id,
            subtotal: r.subtotal,
            discount_total: r.discount_total,
            shipping_total: r.shipping_total,
            total: r.total,
            currency: r.currency,
            shipping_address: r.shipping_address.0,
            billing_address: r.billing_address.map(|b| b.0),
            referral_id: r.referral_id,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            product_name: r.product_name,
            unit_price: r.unit_price,
            quantity: r.quantity,
            line_total: r.line_total,
        }
    }
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// Stock ran out between reading the cart and reserving inventory.
    #[error("insufficient inventory for product {0}")]
    InsufficientInventory(ProductId),

    /// A concurrent order already claimed the user's referral redemption.
    #[error("referral discount already used")]
    DiscountAlreadyUsed,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Who may cancel an order, which decides the allowed starting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelScope {
    /// Only `pending` orders that have not been (or are not being) paid.
    Customer,
    /// Any `pending` or `paid` order.
    Admin,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order with its items.
    ///
    /// In the same transaction this decrements inventory for every line,
    /// attaches the user's pending referral redemption when the order uses
    /// one, and empties `cart_id` if given.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::InsufficientInventory` if any product no
    /// longer has enough stock, and `PlaceOrderError::DiscountAlreadyUsed`
    /// if the order carries a referral discount another order claimed
    /// first; nothing is written in either case.
    /// Returns `PlaceOrderError::Repository` for database failures.
    pub async fn create(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
        cart_id: Option<CartId>,
    ) -> Result<OrderWithItems, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.order \
                (order_number, user_id, email, subtotal, discount_total, shipping_total, total, \
                 currency, shipping_address, billing_address, referral_id, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(&order.email)
        .bind(order.totals.subtotal)
        .bind(order.totals.discount_total)
        .bind(order.totals.shipping_total)
        .bind(order.totals.total)
        .bind(&order.currency)
        .bind(Json(&order.shipping_address))
        .bind(order.billing_address.as_ref().map(Json))
        .bind(order.referral_id)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "order number already exists"))?;

        let created = Order::from(row);

        for item in items {
            reserve_inventory(&mut tx, item.product_id, item.quantity).await?;
        }

        let order_items = insert_items(&mut tx, created.id, items).await?;

        if let (Some(user_id), Some(_)) = (order.user_id, order.referral_id)
            && !referrals::attach_order_in(&mut tx, user_id, created.id).await?
        {
            return Err(PlaceOrderError::DiscountAlreadyUsed);
        }

        if let Some(cart_id) = cart_id {
            sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
                .bind(cart_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(OrderWithItems {
            order: created,
            items: order_items,
        })
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Get an order only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// All orders, newest first, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count_query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM storefront.order");
        if let Some(status) = status {
            count_query.push(" WHERE status = ").push_bind(status);
        }
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM storefront.order"));
        if let Some(status) = status {
            query.push(" WHERE status = ").push_bind(status);
        }
        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(pagination.limit());
        query.push(" OFFSET ");
        query.push_bind(pagination.offset());

        let rows = query
            .build_query_as::<OrderRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(Order::from).collect(),
            total,
            pagination,
        ))
    }

    /// Lines of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM storefront.order_item \
             WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    /// Store the payment processor's intent ID on an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` if the intent is already linked to another order.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET payment_intent_id = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "payment intent already linked"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a payment state. A `succeeded` payment also moves a `pending`
    /// order to `paid`.
    ///
    /// Returns `None` if the order doesn't exist or has been cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.order SET \
                payment_status = $2, \
                status = CASE \
                    WHEN $2 = 'succeeded'::storefront.payment_status AND status = 'pending' \
                    THEN 'paid'::storefront.order_status \
                    ELSE status END, \
                updated_at = NOW() \
             WHERE id = $1 AND status <> 'cancelled' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(payment_status)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Find the order a payment intent belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Set the fulfillment status. Callers validate the transition.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.order SET status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(Order::from(row))
    }

    /// Cancel an order and put its items back in stock.
    ///
    /// Returns `None` when the order is not in a state `scope` may cancel;
    /// nothing changes in that case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn cancel_and_restock(
        &self,
        id: OrderId,
        scope: CancelScope,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.order SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND CASE \
                WHEN $2 THEN status = 'pending' AND payment_status IN ('unpaid', 'failed') \
                ELSE status IN ('pending', 'paid') END \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(scope == CancelScope::Customer)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(
            r"
            UPDATE storefront.product p
            SET inventory = p.inventory + oi.quantity, updated_at = NOW()
            FROM storefront.order_item oi
            WHERE oi.order_id = $1 AND oi.product_id = p.id
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Order::from(row)))
    }
}

/// Decrement stock, refusing to go below zero.
async fn reserve_inventory(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), PlaceOrderError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.product
        SET inventory = inventory - $2, updated_at = NOW()
        WHERE id = $1 AND is_active AND inventory >= $2
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PlaceOrderError::InsufficientInventory(product_id));
    }
    Ok(())
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<Vec<OrderItem>, RepositoryError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO storefront.order_item \
         (order_id, product_id, product_name, unit_price, quantity, line_total) ",
    );
    query.push_values(items, |mut b, item| {
        b.push_bind(order_id)
            .push_bind(item.product_id)
            .push_bind(&item.product_name)
            .push_bind(item.unit_price)
            .push_bind(item.quantity)
            .push_bind(item.line_total);
    });
    query.push(format!(" RETURNING {ORDER_ITEM_COLUMNS}"));

    let mut rows = query
        .build_query_as::<OrderItemRow>()
        .fetch_all(&mut **tx)
        .await?;
    rows.sort_by_key(|r| r.id.as_i32());

    Ok(rows.into_iter().map(OrderItem::from).collect())
}
