//! Checkout and order management.
//!
//! Totals are always recomputed here from the current catalog prices. A
//! client-supplied total is only compared against the computed one so the
//! client can refresh a stale cart; it is never stored.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::{
    Email, OrderId, OrderStatus, OrderTotals, ProductId, ShippingPolicy, UserId, round_currency,
};

use crate::db::orders::{CancelScope, PlaceOrderError};
use crate::db::{CartRepository, OrderRepository, Pagination, ReferralRepository, RepositoryError};
use crate::models::{
    AddressSnapshot, CartLine, CartOwner, CurrentUser, NewOrder, NewOrderItem, Order,
    OrderWithItems, Page,
};
use crate::stripe::{PaymentIntentStatus, StripeClient, StripeError};

/// Prefix of every order number.
const ORDER_NUMBER_PREFIX: &str = "EMP";

/// Length of the random part of an order number.
const ORDER_SUFFIX_LENGTH: usize = 6;

const ORDER_SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Longest accepted order note.
const MAX_NOTES_LENGTH: usize = 1000;

/// Errors from checkout and order operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Validation(String),

    #[error("{0} is no longer available")]
    ProductUnavailable(String),

    #[error("insufficient inventory for product {product_id}")]
    InsufficientInventory { product_id: ProductId },

    /// The client's expected total no longer matches current prices.
    #[error("order total changed from {expected} to {actual}")]
    PriceChanged { expected: Decimal, actual: Decimal },

    #[error("order not found")]
    OrderNotFound,

    #[error("order can no longer be cancelled")]
    NotCancellable,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Another order already used the first-order referral discount.
    #[error("referral discount was already applied to another order")]
    DiscountAlreadyUsed,

    #[error("payments are not configured")]
    PaymentsNotConfigured,

    #[error("payment provider error: {0}")]
    PaymentProvider(#[from] StripeError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PlaceOrderError> for CheckoutError {
    fn from(err: PlaceOrderError) -> Self {
        match err {
            PlaceOrderError::InsufficientInventory(product_id) => {
                Self::InsufficientInventory { product_id }
            }
            PlaceOrderError::DiscountAlreadyUsed => Self::DiscountAlreadyUsed,
            PlaceOrderError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Body of a checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: AddressSnapshot,
    pub billing_address: Option<AddressSnapshot>,
    /// Required for guest checkout; ignored for logged-in users.
    pub email: Option<String>,
    pub notes: Option<String>,
    /// Total the client displayed; checked, never trusted.
    pub expected_total: Option<Decimal>,
}

/// Checkout and order operations.
pub struct CheckoutService<'a> {
    carts: CartRepository<'a>,
    orders: OrderRepository<'a>,
    referrals: ReferralRepository<'a>,
    stripe: Option<&'a StripeClient>,
    shipping: &'a ShippingPolicy,
    currency: &'a str,
}

/// What cancelling an order requires of its payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentRelease {
    /// The intent is still chargeable and must be cancelled first.
    Cancel,
    /// Nothing to do at Stripe.
    Skip,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingPolicy, currency: &'a str) -> Self {
        Self {
            carts: CartRepository::new(pool),
            orders: OrderRepository::new(pool),
            referrals: ReferralRepository::new(pool),
            stripe: None,
            shipping,
            currency,
        }
    }

    /// Use `stripe` to release open payment intents when orders are cancelled.
    #[must_use]
    pub const fn with_stripe(mut self, stripe: Option<&'a StripeClient>) -> Self {
        self.stripe = stripe;
        self
    }

    /// Turn the owner's cart into a pending, unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if there is nothing to buy,
    /// `CheckoutError::Validation` for a bad address or missing guest email,
    /// `CheckoutError::ProductUnavailable` / `InsufficientInventory` when the
    /// catalog can't cover the cart, and `CheckoutError::PriceChanged` when
    /// `expected_total` is stale.
    #[instrument(skip(self, owner, user, request), fields(user_id))]
    pub async fn place_order(
        &self,
        owner: &CartOwner,
        user: Option<&CurrentUser>,
        request: &CheckoutRequest,
    ) -> Result<OrderWithItems, CheckoutError> {
        if let Some(user) = user {
            tracing::Span::current().record("user_id", tracing::field::display(user.id));
        }

        let email = resolve_email(user, request.email.as_deref())?;
        validate_addresses(request)?;
        let notes = normalize_notes(request.notes.as_deref())?;

        let cart_id = self.carts.find(owner).await?.ok_or(CheckoutError::EmptyCart)?;
        let lines = self.carts.items(cart_id).await?;
        check_lines(&lines)?;

        let pending = match user {
            Some(user) => self.referrals.pending_discount_for_user(user.id).await?,
            None => None,
        };
        let discount_percent = pending
            .and_then(|p| u8::try_from(p.discount_percent).ok())
            .unwrap_or(0);

        let amounts: Vec<_> = lines.iter().map(CartLine::amount).collect();
        let totals = OrderTotals::compute(&amounts, discount_percent, self.shipping);
        check_expected_total(request.expected_total, &totals)?;

        let new_order = NewOrder {
            order_number: generate_order_number(Utc::now()),
            user_id: user.map(|u| u.id),
            email,
            totals,
            currency: self.currency.to_owned(),
            shipping_address: request.shipping_address.clone(),
            billing_address: request.billing_address.clone(),
            referral_id: pending.map(|p| p.referral_id),
            notes,
        };
        let items: Vec<NewOrderItem> = lines.iter().map(order_item_from_line).collect();

        let placed = self.orders.create(&new_order, &items, Some(cart_id)).await?;

        tracing::info!(
            order_id = %placed.order.id,
            order_number = %placed.order.order_number,
            total = %placed.order.total,
            "Order placed"
        );

        Ok(placed)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the query fails.
    pub async fn list_mine(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// One of the user's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order isn't the user's.
    pub async fn get_mine(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderWithItems, CheckoutError> {
        let order = self
            .orders
            .get_for_user(order_id, user_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        let items = self.orders.items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Cancel one of the user's pending, unpaid orders and restock it.
    ///
    /// An open payment intent is cancelled at Stripe first so the card can't
    /// be charged for an order that will never ship.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order isn't the user's
    /// and `CheckoutError::NotCancellable` once it is paid or shipped, or
    /// when Stripe refuses to cancel the intent.
    #[instrument(skip(self))]
    pub async fn cancel_mine(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .orders
            .get_for_user(order_id, user_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if !order.is_cancellable() {
            return Err(CheckoutError::NotCancellable);
        }

        self.release_payment_intent(&order, CancelScope::Customer).await?;

        let cancelled = self
            .orders
            .cancel_and_restock(order.id, CancelScope::Customer)
            .await?
            .ok_or(CheckoutError::NotCancellable)?;

        tracing::info!(order_id = %cancelled.id, "Order cancelled by customer");
        Ok(cancelled)
    }

    /// Every order, for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the query fails.
    pub async fn admin_list(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Order>, CheckoutError> {
        Ok(self.orders.list_all(status, pagination).await?)
    }

    /// Move an order through fulfillment.
    ///
    /// Cancelling restocks the order's items.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for unknown orders and
    /// `CheckoutError::InvalidTransition` for moves the lifecycle forbids.
    #[instrument(skip(self))]
    pub async fn admin_update_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if !order.status.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        let updated = if next == OrderStatus::Cancelled {
            self.release_payment_intent(&order, CancelScope::Admin).await?;
            self.orders
                .cancel_and_restock(order.id, CancelScope::Admin)
                .await?
                .ok_or(CheckoutError::InvalidTransition {
                    from: order.status,
                    to: next,
                })?
        } else {
            self.orders.update_status(order.id, next).await?
        };

        tracing::info!(
            order_id = %updated.id,
            from = %order.status,
            to = %updated.status,
            "Order status updated"
        );
        Ok(updated)
    }

    /// Cancel the order's payment intent at Stripe if it can still be charged.
    async fn release_payment_intent(
        &self,
        order: &Order,
        scope: CancelScope,
    ) -> Result<(), CheckoutError> {
        let Some(intent_id) = order.payment_intent_id.as_deref() else {
            return Ok(());
        };
        let stripe = self.stripe.ok_or(CheckoutError::PaymentsNotConfigured)?;

        let intent = stripe.retrieve_payment_intent(intent_id).await?;
        if intent_release(intent.status, scope)? == IntentRelease::Skip {
            return Ok(());
        }

        match stripe.cancel_payment_intent(intent_id).await {
            Ok(_) => {
                tracing::info!(
                    order_id = %order.id,
                    payment_intent_id = %intent_id,
                    "Payment intent cancelled"
                );
                Ok(())
            }
            Err(e @ StripeError::Api { .. }) => {
                tracing::warn!(
                    order_id = %order.id,
                    payment_intent_id = %intent_id,
                    error = %e,
                    "Stripe refused to cancel payment intent"
                );
                Err(CheckoutError::NotCancellable)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `EMP-YYYYMMDD-XXXXXX` with a random uppercase alphanumeric suffix.
fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LENGTH)
        .filter_map(|_| {
            ORDER_SUFFIX_ALPHABET
                .choose(&mut rng)
                .copied()
                .map(char::from)
        })
        .collect();
    format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d"))
}

/// Logged-in users check out with their account email; guests must give one.
fn resolve_email(
    user: Option<&CurrentUser>,
    provided: Option<&str>,
) -> Result<String, CheckoutError> {
    if let Some(user) = user {
        return Ok(user.email.as_str().to_owned());
    }

    let provided = provided
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| CheckoutError::Validation("email is required for guest checkout".into()))?;

    Email::parse(provided)
        .map(Email::into_inner)
        .map_err(|e| CheckoutError::Validation(format!("invalid email: {e}")))
}

fn validate_addresses(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    request
        .shipping_address
        .validate()
        .map_err(|e| CheckoutError::Validation(format!("shipping address: {e}")))?;

    if let Some(billing) = &request.billing_address {
        billing
            .validate()
            .map_err(|e| CheckoutError::Validation(format!("billing address: {e}")))?;
    }

    Ok(())
}

fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, CheckoutError> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(CheckoutError::Validation(format!(
            "notes cannot exceed {MAX_NOTES_LENGTH} characters"
        )));
    }
    Ok(Some(notes.to_owned()))
}

/// Every line must be purchasable at its current quantity.
fn check_lines(lines: &[CartLine]) -> Result<(), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    for line in lines {
        if !line.is_active {
            return Err(CheckoutError::ProductUnavailable(line.name.clone()));
        }
        if line.quantity > line.inventory {
            return Err(CheckoutError::InsufficientInventory {
                product_id: line.product_id,
            });
        }
    }

    Ok(())
}

fn check_expected_total(
    expected: Option<Decimal>,
    totals: &OrderTotals,
) -> Result<(), CheckoutError> {
    match expected {
        Some(expected) if round_currency(expected) != totals.total => {
            Err(CheckoutError::PriceChanged {
                expected,
                actual: totals.total,
            })
        }
        _ => Ok(()),
    }
}

/// Decide what an intent in `status` needs before the order is cancelled.
///
/// Customers can't cancel once money is moving. Admins may cancel paid
/// orders; only still-open intents are cancelled for them.
fn intent_release(
    status: PaymentIntentStatus,
    scope: CancelScope,
) -> Result<IntentRelease, CheckoutError> {
    match status {
        PaymentIntentStatus::Canceled => Ok(IntentRelease::Skip),
        PaymentIntentStatus::Succeeded | PaymentIntentStatus::Processing => match scope {
            CancelScope::Customer => Err(CheckoutError::NotCancellable),
            CancelScope::Admin => Ok(IntentRelease::Skip),
        },
        PaymentIntentStatus::RequiresPaymentMethod
        | PaymentIntentStatus::RequiresConfirmation
        | PaymentIntentStatus::RequiresAction
        | PaymentIntentStatus::RequiresCapture
        | PaymentIntentStatus::Unknown => Ok(IntentRelease::Cancel),
    }
}

fn order_item_from_line(line: &CartLine) -> NewOrderItem {
    NewOrderItem {
        product_id: line.product_id,
        product_name: line.name.clone(),
        unit_price: line.unit_price,
        quantity: line.quantity,
        line_total: line.amount().total(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use emporium_core::{LineAmount, Slug};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(id: i32, price: &str, quantity: i32, inventory: i32) -> CartLine {
        let unit_price = dec(price);
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: Slug::parse(&format!("product-{id}")).unwrap(),
            image_url: None,
            unit_price,
            quantity,
            line_total: unit_price * Decimal::from(quantity),
            inventory,
            is_active: true,
        }
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(3),
            email: Email::parse("shopper@example.com").unwrap(),
            username: "shopper".to_owned(),
            is_admin: false,
        }
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("EMP-20260309-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), ORDER_SUFFIX_LENGTH);
        assert!(
            suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn test_user_email_wins_over_provided() {
        let u = user();
        assert_eq!(
            resolve_email(Some(&u), Some("other@example.com")).unwrap(),
            "shopper@example.com"
        );
    }

    #[test]
    fn test_guest_requires_valid_email() {
        assert!(matches!(
            resolve_email(None, None),
            Err(CheckoutError::Validation(_))
        ));
        assert!(matches!(
            resolve_email(None, Some("  ")),
            Err(CheckoutError::Validation(_))
        ));
        assert!(resolve_email(None, Some("not-an-email")).is_err());
        assert_eq!(
            resolve_email(None, Some("Guest@Example.com")).unwrap(),
            "guest@example.com"
        );
    }

    #[test]
    fn test_check_lines() {
        assert!(matches!(check_lines(&[]), Err(CheckoutError::EmptyCart)));
        assert!(check_lines(&[line(1, "9.99", 2, 5)]).is_ok());

        assert!(matches!(
            check_lines(&[line(1, "9.99", 6, 5)]),
            Err(CheckoutError::InsufficientInventory { .. })
        ));

        let mut inactive = line(2, "1.00", 1, 5);
        inactive.is_active = false;
        assert!(matches!(
            check_lines(&[inactive]),
            Err(CheckoutError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_expected_total_mismatch() {
        let totals = OrderTotals::compute(
            &[LineAmount {
                unit_price: dec("20.00"),
                quantity: 1,
            }],
            0,
            &ShippingPolicy::default(),
        );
        assert_eq!(totals.total, dec("25.99"));

        assert!(check_expected_total(None, &totals).is_ok());
        assert!(check_expected_total(Some(dec("25.99")), &totals).is_ok());
        assert!(matches!(
            check_expected_total(Some(dec("20.00")), &totals),
            Err(CheckoutError::PriceChanged { .. })
        ));
    }

    #[test]
    fn test_open_intent_is_cancelled_before_order() {
        for status in [
            PaymentIntentStatus::RequiresPaymentMethod,
            PaymentIntentStatus::RequiresConfirmation,
            PaymentIntentStatus::RequiresAction,
        ] {
            assert_eq!(
                intent_release(status, CancelScope::Customer).unwrap(),
                IntentRelease::Cancel
            );
        }
        assert_eq!(
            intent_release(PaymentIntentStatus::Canceled, CancelScope::Customer).unwrap(),
            IntentRelease::Skip
        );
    }

    #[test]
    fn test_customer_cannot_cancel_once_charged() {
        for status in [PaymentIntentStatus::Succeeded, PaymentIntentStatus::Processing] {
            assert!(matches!(
                intent_release(status, CancelScope::Customer),
                Err(CheckoutError::NotCancellable)
            ));
            assert_eq!(
                intent_release(status, CancelScope::Admin).unwrap(),
                IntentRelease::Skip
            );
        }
    }

    #[test]
    fn test_order_item_snapshot() {
        let item = order_item_from_line(&line(7, "3.33", 3, 10));
        assert_eq!(item.product_name, "Product 7");
        assert_eq!(item.line_total, dec("9.99"));
    }

    #[test]
    fn test_notes_trimmed_and_bounded() {
        assert_eq!(normalize_notes(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_notes(Some(" leave at door ")).unwrap().as_deref(),
            Some("leave at door")
        );
        assert!(normalize_notes(Some(&"x".repeat(MAX_NOTES_LENGTH + 1))).is_err());
    }
}
