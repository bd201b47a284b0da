//! Order payments.
//!
//! Payment state on an order only ever changes from what Stripe reports,
//! either by retrieving the intent or through a signed webhook. The
//! browser's word that a payment went through is never taken.

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::{OrderId, OrderStatus, PaymentStatus, UserId, to_minor_units};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::Order;
use crate::stripe::{PaymentIntent, PaymentIntentStatus, StripeClient, StripeError};

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payments are not configured")]
    NotConfigured,

    #[error("order not found")]
    OrderNotFound,

    #[error("{0}")]
    NotPayable(String),

    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),

    #[error("payment provider error: {0}")]
    Stripe(#[from] StripeError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Who is asking about an order's payment.
#[derive(Debug, Clone, Copy)]
pub enum PaymentCaller<'c> {
    User(UserId),
    /// A guest, identified by the orders placed in their session.
    Guest(&'c [OrderId]),
}

impl PaymentCaller<'_> {
    fn owns(&self, order: &Order) -> bool {
        match self {
            Self::User(id) => order.user_id == Some(*id),
            Self::Guest(ids) => order.user_id.is_none() && ids.contains(&order.id),
        }
    }
}

/// What the browser needs to confirm a payment.
#[derive(Debug, Clone, Serialize)]
pub struct IntentResponse {
    pub order_id: OrderId,
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

/// Payment operations on orders.
pub struct PaymentService<'a> {
    orders: OrderRepository<'a>,
    stripe: Option<&'a StripeClient>,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: Option<&'a StripeClient>) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            stripe,
        }
    }

    fn stripe(&self) -> Result<&'a StripeClient, PaymentError> {
        self.stripe.ok_or(PaymentError::NotConfigured)
    }

    /// Create (or reuse) the payment intent for an unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the caller doesn't own the
    /// order and `PaymentError::NotPayable` once it is paid or cancelled.
    #[instrument(skip(self, caller))]
    pub async fn create_intent_for_order(
        &self,
        caller: PaymentCaller<'_>,
        order_id: OrderId,
    ) -> Result<IntentResponse, PaymentError> {
        let stripe = self.stripe()?;
        let order = self.load_owned(caller, order_id).await?;
        ensure_payable(&order)?;

        let amount = to_minor_units(order.total)
            .ok_or_else(|| PaymentError::NotPayable("order total is invalid".to_owned()))?;

        if let Some(existing_id) = &order.payment_intent_id {
            let existing = stripe.retrieve_payment_intent(existing_id).await?;
            if is_reusable(&existing, amount, &order.currency)
                && let Some(client_secret) = existing.client_secret.clone()
            {
                return Ok(IntentResponse {
                    order_id: order.id,
                    payment_intent_id: existing.id,
                    client_secret,
                    amount,
                    currency: order.currency,
                });
            }
        }

        let metadata = [
            ("order_id", order.id.to_string()),
            ("order_number", order.order_number.clone()),
        ];
        // A replacement intent must not collide with the first one's key.
        let idempotency_key = order
            .payment_intent_id
            .is_none()
            .then(|| format!("order-{}-intent", order.id));

        let intent = stripe
            .create_payment_intent(
                amount,
                &order.currency,
                &metadata,
                idempotency_key.as_deref(),
            )
            .await?;

        self.orders.set_payment_intent(order.id, &intent.id).await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            PaymentError::Stripe(StripeError::Parse(
                "payment intent has no client secret".to_owned(),
            ))
        })?;

        tracing::info!(
            order_id = %order.id,
            payment_intent_id = %intent.id,
            "Payment intent created"
        );

        Ok(IntentResponse {
            order_id: order.id,
            payment_intent_id: intent.id,
            client_secret,
            amount,
            currency: order.currency,
        })
    }

    /// Check the order's intent with Stripe and record the outcome.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the caller doesn't own the
    /// order and `PaymentError::NotPayable` if no payment was started.
    #[instrument(skip(self, caller))]
    pub async fn confirm_order_payment(
        &self,
        caller: PaymentCaller<'_>,
        order_id: OrderId,
    ) -> Result<Order, PaymentError> {
        let stripe = self.stripe()?;
        let order = self.load_owned(caller, order_id).await?;

        let Some(intent_id) = order.payment_intent_id.as_deref() else {
            return Err(PaymentError::NotPayable(
                "no payment has been started for this order".to_owned(),
            ));
        };

        let intent = stripe.retrieve_payment_intent(intent_id).await?;
        self.reconcile(order, &intent).await
    }

    /// Verify and apply a Stripe webhook.
    ///
    /// Unknown event types and intents that match no order are acknowledged
    /// without changes.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidWebhook` if the signature or payload is
    /// bad.
    #[instrument(skip_all)]
    pub async fn handle_webhook(&self, payload: &str, signature: &str) -> Result<(), PaymentError> {
        let stripe = self.stripe()?;
        let event = stripe
            .construct_event(payload, signature)
            .map_err(|e| PaymentError::InvalidWebhook(e.to_string()))?;

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook");

        if !matches!(
            event.event_type.as_str(),
            "payment_intent.succeeded"
                | "payment_intent.payment_failed"
                | "payment_intent.processing"
                | "payment_intent.canceled"
        ) {
            tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
            return Ok(());
        }

        let intent: PaymentIntent = serde_json::from_value(event.data.object)
            .map_err(|e| PaymentError::InvalidWebhook(format!("bad payment intent: {e}")))?;

        let Some(order) = self.orders.find_by_payment_intent(&intent.id).await? else {
            tracing::warn!(payment_intent_id = %intent.id, "Webhook for unknown payment intent");
            return Ok(());
        };

        self.reconcile(order, &intent).await?;
        Ok(())
    }

    async fn load_owned(
        &self,
        caller: PaymentCaller<'_>,
        order_id: OrderId,
    ) -> Result<Order, PaymentError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        if !caller.owns(&order) {
            return Err(PaymentError::OrderNotFound);
        }
        Ok(order)
    }

    /// Bring the order's payment status in line with the intent.
    ///
    /// Cancelled orders are never moved to paid. A charge that lands on one
    /// is reported at error level for a manual refund.
    async fn reconcile(&self, order: Order, intent: &PaymentIntent) -> Result<Order, PaymentError> {
        if is_charged_after_cancel(intent, &order) {
            report_charged_after_cancel(&order, intent);
            return Ok(order);
        }

        if order.payment_status == PaymentStatus::Succeeded {
            return Ok(order);
        }

        let Some(next) = payment_status_for(intent, &order) else {
            return Ok(order);
        };

        if next == order.payment_status {
            return Ok(order);
        }

        let Some(updated) = self.orders.update_payment_status(order.id, next).await? else {
            // Cancelled between the read above and the update.
            if next == PaymentStatus::Succeeded {
                report_charged_after_cancel(&order, intent);
            }
            return Ok(order);
        };
        tracing::info!(
            order_id = %updated.id,
            payment_status = %updated.payment_status,
            status = %updated.status,
            "Order payment reconciled"
        );
        Ok(updated)
    }
}

fn ensure_payable(order: &Order) -> Result<(), PaymentError> {
    if order.status == OrderStatus::Cancelled {
        return Err(PaymentError::NotPayable("order is cancelled".to_owned()));
    }
    if !order.payment_status.is_payable() {
        return Err(PaymentError::NotPayable(format!(
            "order payment is already {}",
            order.payment_status
        )));
    }
    Ok(())
}

/// Whether Stripe took money for an order that has been cancelled.
fn is_charged_after_cancel(intent: &PaymentIntent, order: &Order) -> bool {
    order.status == OrderStatus::Cancelled && intent.status == PaymentIntentStatus::Succeeded
}

fn report_charged_after_cancel(order: &Order, intent: &PaymentIntent) {
    tracing::error!(
        order_id = %order.id,
        order_number = %order.order_number,
        payment_intent_id = %intent.id,
        amount = intent.amount,
        "Payment succeeded for a cancelled order; refund required"
    );
}

/// An existing intent can be handed out again if it is still open for the
/// same amount.
fn is_reusable(intent: &PaymentIntent, amount: i64, currency: &str) -> bool {
    intent.amount == amount
        && intent.currency.eq_ignore_ascii_case(currency)
        && matches!(
            intent.status,
            PaymentIntentStatus::RequiresPaymentMethod
                | PaymentIntentStatus::RequiresConfirmation
                | PaymentIntentStatus::RequiresAction
        )
}

/// The order payment status an intent implies, if it implies a change.
///
/// An intent whose amount or currency disagrees with the order is treated
/// as a failed payment. A cancelled order's payment status never changes.
fn payment_status_for(intent: &PaymentIntent, order: &Order) -> Option<PaymentStatus> {
    if order.status == OrderStatus::Cancelled {
        return None;
    }

    let expected = to_minor_units(order.total);
    if expected != Some(intent.amount) || !intent.currency.eq_ignore_ascii_case(&order.currency) {
        tracing::warn!(
            order_id = %order.id,
            payment_intent_id = %intent.id,
            intent_amount = intent.amount,
            order_total = %order.total,
            "Payment intent does not match order total"
        );
        return Some(PaymentStatus::Failed);
    }

    match intent.status {
        PaymentIntentStatus::Succeeded => Some(PaymentStatus::Succeeded),
        PaymentIntentStatus::Processing => Some(PaymentStatus::Processing),
        PaymentIntentStatus::RequiresPaymentMethod | PaymentIntentStatus::Canceled => {
            // A fresh intent also sits in requires_payment_method; only an
            // attempted payment counts as failed.
            (order.payment_status != PaymentStatus::Unpaid).then_some(PaymentStatus::Failed)
        }
        PaymentIntentStatus::RequiresConfirmation
        | PaymentIntentStatus::RequiresAction
        | PaymentIntentStatus::RequiresCapture
        | PaymentIntentStatus::Unknown => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::models::AddressSnapshot;

    use super::*;

    fn order(total: &str, payment_status: PaymentStatus) -> Order {
        Order {
            id: OrderId::new(42),
            order_number: "EMP-20260301-ABC123".to_owned(),
            user_id: Some(UserId::new(1)),
            email: "buyer@example.com".to_owned(),
            status: OrderStatus::Pending,
            payment_status,
            payment_intent_id: Some("pi_1".to_owned()),
            subtotal: total.parse().unwrap(),
            discount_total: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            total: total.parse().unwrap(),
            currency: "usd".to_owned(),
            shipping_address: AddressSnapshot {
                full_name: "Ada Lovelace".to_owned(),
                street_line1: "1 Main St".to_owned(),
                street_line2: None,
                city: "Springfield".to_owned(),
                province: None,
                country: "US".to_owned(),
                zip: "12345".to_owned(),
                phone: None,
            },
            billing_address: None,
            referral_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn intent(amount: i64, status: PaymentIntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: "pi_1".to_owned(),
            amount,
            currency: "usd".to_owned(),
            status,
            client_secret: Some("secret".to_owned()),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_succeeded_intent_marks_paid() {
        let o = order("25.99", PaymentStatus::Unpaid);
        assert_eq!(
            payment_status_for(&intent(2599, PaymentIntentStatus::Succeeded), &o),
            Some(PaymentStatus::Succeeded)
        );
        assert_eq!(
            payment_status_for(&intent(2599, PaymentIntentStatus::Processing), &o),
            Some(PaymentStatus::Processing)
        );
    }

    #[test]
    fn test_amount_mismatch_is_failure() {
        let o = order("25.99", PaymentStatus::Unpaid);
        assert_eq!(
            payment_status_for(&intent(100, PaymentIntentStatus::Succeeded), &o),
            Some(PaymentStatus::Failed)
        );
    }

    #[test]
    fn test_fresh_intent_is_not_failure() {
        let o = order("10.00", PaymentStatus::Unpaid);
        let i = intent(1000, PaymentIntentStatus::RequiresPaymentMethod);
        assert_eq!(payment_status_for(&i, &o), None);

        let o = order("10.00", PaymentStatus::Processing);
        assert_eq!(payment_status_for(&i, &o), Some(PaymentStatus::Failed));
    }

    #[test]
    fn test_pending_actions_leave_status() {
        let o = order("10.00", PaymentStatus::Unpaid);
        assert_eq!(
            payment_status_for(&intent(1000, PaymentIntentStatus::RequiresAction), &o),
            None
        );
    }

    #[test]
    fn test_cancelled_order_is_never_marked_paid() {
        let mut cancelled = order("25.99", PaymentStatus::Unpaid);
        cancelled.status = OrderStatus::Cancelled;
        let succeeded = intent(2599, PaymentIntentStatus::Succeeded);

        assert_eq!(payment_status_for(&succeeded, &cancelled), None);
        assert!(is_charged_after_cancel(&succeeded, &cancelled));

        let voided = intent(2599, PaymentIntentStatus::Canceled);
        assert!(!is_charged_after_cancel(&voided, &cancelled));
        assert!(!is_charged_after_cancel(
            &succeeded,
            &order("25.99", PaymentStatus::Unpaid)
        ));
    }

    #[test]
    fn test_ensure_payable() {
        assert!(ensure_payable(&order("1.00", PaymentStatus::Unpaid)).is_ok());
        assert!(ensure_payable(&order("1.00", PaymentStatus::Failed)).is_ok());
        assert!(matches!(
            ensure_payable(&order("1.00", PaymentStatus::Succeeded)),
            Err(PaymentError::NotPayable(_))
        ));

        let mut cancelled = order("1.00", PaymentStatus::Unpaid);
        cancelled.status = OrderStatus::Cancelled;
        assert!(ensure_payable(&cancelled).is_err());
    }

    #[test]
    fn test_reusable_intent() {
        assert!(is_reusable(
            &intent(500, PaymentIntentStatus::RequiresPaymentMethod),
            500,
            "usd"
        ));
        assert!(!is_reusable(
            &intent(500, PaymentIntentStatus::Canceled),
            500,
            "usd"
        ));
        assert!(!is_reusable(
            &intent(400, PaymentIntentStatus::RequiresPaymentMethod),
            500,
            "usd"
        ));
    }

    #[test]
    fn test_caller_ownership() {
        let o = order("1.00", PaymentStatus::Unpaid);
        assert!(PaymentCaller::User(UserId::new(1)).owns(&o));
        assert!(!PaymentCaller::User(UserId::new(2)).owns(&o));

        let mut guest_order = o;
        guest_order.user_id = None;
        assert!(PaymentCaller::Guest(&[OrderId::new(42)]).owns(&guest_order));
        assert!(!PaymentCaller::Guest(&[]).owns(&guest_order));
    }
}
