//! Stripe API object types.
//!
//! Only the fields the storefront reads are modelled; everything else in
//! Stripe's responses is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    /// Handed to the browser to confirm the payment.
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Lifecycle of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

/// A webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// Event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The object the event is about; its shape depends on `event_type`.
    pub object: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_intent_deserialization() {
        let json = r#"{
            "id": "pi_3Abc",
            "object": "payment_intent",
            "amount": 2599,
            "currency": "usd",
            "status": "requires_payment_method",
            "client_secret": "pi_3Abc_secret_xyz",
            "metadata": {"order_id": "42"}
        }"#;

        let intent: PaymentIntent = serde_json::from_str(json).expect("deserialize");
        assert_eq!(intent.amount, 2599);
        assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.metadata.get("order_id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_unknown_status() {
        let status: PaymentIntentStatus =
            serde_json::from_str(r#""some_new_status""#).expect("deserialize");
        assert_eq!(status, PaymentIntentStatus::Unknown);
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 100, "currency": "usd", "status": "succeeded"}}
        }"#;

        let event: Event = serde_json::from_str(json).expect("deserialize");
        assert_eq!(event.event_type, "payment_intent.succeeded");
        let intent: PaymentIntent =
            serde_json::from_value(event.data.object).expect("payment intent");
        assert_eq!(intent.status, PaymentIntentStatus::Succeeded);
        assert!(intent.client_secret.is_none());
    }
}
