//! Money arithmetic and order totals.
//!
//! Amounts are `rust_decimal::Decimal` in the currency's standard unit
//! (dollars, not cents) and are stored as `NUMERIC(10, 2)`. The payment
//! processor wants integer minor units, see [`to_minor_units`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to cents, midpoints away from zero.
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a standard-unit amount to minor units (cents).
///
/// Returns `None` for negative amounts or values that overflow `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    (round_currency(amount) * Decimal::ONE_HUNDRED).to_i64()
}

/// Format an amount for display, e.g. `$19.99`.
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    format!("${:.2}", round_currency(amount))
}

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Charged when the discounted subtotal is below `free_threshold`.
    pub flat_rate: Decimal,
    /// Orders at or above this amount ship free.
    pub free_threshold: Decimal,
}

impl ShippingPolicy {
    /// Shipping charge for a given merchandise amount.
    #[must_use]
    pub fn charge_for(&self, merchandise: Decimal) -> Decimal {
        if merchandise <= Decimal::ZERO || merchandise >= self.free_threshold {
            Decimal::ZERO
        } else {
            self.flat_rate
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_rate: Decimal::new(599, 2),
            free_threshold: Decimal::new(50, 0),
        }
    }
}

/// One priced line going into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    /// Unit price at the time of purchase.
    pub unit_price: Decimal,
    /// Quantity, always at least 1.
    pub quantity: i32,
}

impl LineAmount {
    /// `unit_price * quantity`, rounded to cents.
    #[must_use]
    pub fn total(&self) -> Decimal {
        round_currency(self.unit_price * Decimal::from(self.quantity))
    }
}

/// Server-computed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from order lines.
    ///
    /// The discount is a percentage of the subtotal (clamped to 0..=100) and
    /// shipping is charged on the discounted amount. The total never goes
    /// below zero.
    #[must_use]
    pub fn compute(lines: &[LineAmount], discount_percent: u8, shipping: &ShippingPolicy) -> Self {
        let subtotal: Decimal = lines.iter().map(LineAmount::total).sum();
        let percent = Decimal::from(discount_percent.min(100));
        let discount_total = round_currency(subtotal * percent / Decimal::ONE_HUNDRED);
        let merchandise = subtotal - discount_total;
        let shipping_total = shipping.charge_for(merchandise);
        let total = (merchandise + shipping_total).max(Decimal::ZERO);

        Self {
            subtotal,
            discount_total,
            shipping_total,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    #[test]
    fn test_round_currency_half_up() {
        assert_eq!(round_currency(dec("1.005")), dec("1.01"));
        assert_eq!(round_currency(dec("1.004")), dec("1.00"));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec("19.99")), Some(1999));
        assert_eq!(to_minor_units(dec("0")), Some(0));
        assert_eq!(to_minor_units(dec("-1.00")), None);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec("5")), "$5.00");
        assert_eq!(format_usd(dec("12.345")), "$12.35");
    }

    #[test]
    fn test_totals_below_free_shipping() {
        let lines = [
            LineAmount {
                unit_price: dec("10.00"),
                quantity: 2,
            },
            LineAmount {
                unit_price: dec("4.50"),
                quantity: 1,
            },
        ];
        let totals = OrderTotals::compute(&lines, 0, &ShippingPolicy::default());
        assert_eq!(totals.subtotal, dec("24.50"));
        assert_eq!(totals.discount_total, dec("0"));
        assert_eq!(totals.shipping_total, dec("5.99"));
        assert_eq!(totals.total, dec("30.49"));
    }

    #[test]
    fn test_totals_free_shipping_at_threshold() {
        let lines = [LineAmount {
            unit_price: dec("25.00"),
            quantity: 2,
        }];
        let totals = OrderTotals::compute(&lines, 0, &ShippingPolicy::default());
        assert_eq!(totals.shipping_total, Decimal::ZERO);
        assert_eq!(totals.total, dec("50.00"));
    }

    #[test]
    fn test_discount_applies_before_shipping_threshold() {
        let lines = [LineAmount {
            unit_price: dec("50.00"),
            quantity: 1,
        }];
        let totals = OrderTotals::compute(&lines, 10, &ShippingPolicy::default());
        assert_eq!(totals.discount_total, dec("5.00"));
        assert_eq!(totals.shipping_total, dec("5.99"));
        assert_eq!(totals.total, dec("50.99"));
    }

    #[test]
    fn test_discount_is_clamped() {
        let lines = [LineAmount {
            unit_price: dec("8.00"),
            quantity: 1,
        }];
        let totals = OrderTotals::compute(&lines, 250, &ShippingPolicy::default());
        assert_eq!(totals.discount_total, dec("8.00"));
        assert_eq!(totals.shipping_total, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_empty_order_has_no_shipping() {
        let totals = OrderTotals::compute(&[], 0, &ShippingPolicy::default());
        assert_eq!(totals.total, Decimal::ZERO);
    }
}
