//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use emporium_core::{
    OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentStatus, ProductId, ReferralId, UserId,
};

use super::AddressSnapshot;

/// A placed order. Only the status fields change after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing identifier, `EMP-YYYYMMDD-XXXXXX`.
    pub order_number: String,
    /// `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing)]
    pub payment_intent_id: Option<String>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub shipping_address: AddressSnapshot,
    pub billing_address: Option<AddressSnapshot>,
    pub referral_id: Option<ReferralId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the customer may still cancel this order themselves.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self.status, OrderStatus::Pending)
            && !matches!(
                self.payment_status,
                PaymentStatus::Succeeded | PaymentStatus::Processing | PaymentStatus::Refunded
            )
    }
}

/// A purchased line, frozen at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order with its lines, the shape returned by order detail endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Everything needed to insert an order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub email: String,
    pub totals: OrderTotals,
    pub currency: String,
    pub shipping_address: AddressSnapshot,
    pub billing_address: Option<AddressSnapshot>,
    pub referral_id: Option<ReferralId>,
    pub notes: Option<String>,
}

/// A line to insert with its snapshot values.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}
