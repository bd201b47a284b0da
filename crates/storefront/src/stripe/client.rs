//! Stripe REST client for payment intents.
//!
//! Stripe takes form-encoded request bodies and authenticates with the
//! secret key as a bearer token.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, instrument};

use crate::config::PaymentsConfig;

use super::error::{ApiErrorResponse, StripeError};
use super::types::{Event, PaymentIntent};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook signature timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    secret_key: SecretString,
    webhook_secret: Option<SecretString>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new(config: &PaymentsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            inner: Arc::new(StripeClientInner {
                client,
                secret_key: config.secret_key.clone(),
                webhook_secret: config.webhook_secret.clone(),
            }),
        }
    }

    /// Create a payment intent with automatic payment methods.
    ///
    /// # Arguments
    ///
    /// * `amount` - Amount in minor units (cents)
    /// * `currency` - Lowercase ISO currency code
    /// * `metadata` - Key/value pairs stored on the intent
    /// * `idempotency_key` - Makes retries return the same intent
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    #[instrument(skip(self, metadata))]
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<PaymentIntent, StripeError> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_owned(), amount.to_string()),
            ("currency".to_owned(), currency.to_owned()),
            (
                "automatic_payment_methods[enabled]".to_owned(),
                "true".to_owned(),
            ),
        ];
        params.extend(
            metadata
                .iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
        );

        let mut request = self
            .inner
            .client
            .post(format!("{STRIPE_API_URL}/payment_intents"))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&params);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let intent: PaymentIntent = handle_response(request.send().await?).await?;
        debug!(payment_intent_id = %intent.id, "Created payment intent");
        Ok(intent)
    }

    /// Fetch a payment intent's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the intent doesn't exist.
    #[instrument(skip(self))]
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        let response = self
            .inner
            .client
            .get(format!("{STRIPE_API_URL}/payment_intents/{id}"))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        handle_response(response).await
    }

    /// Cancel a payment intent so it can no longer be charged.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` if the intent is already processing or
    /// succeeded, or another error if the request fails.
    #[instrument(skip(self))]
    pub async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        let response = self
            .inner
            .client
            .post(format!("{STRIPE_API_URL}/payment_intents/{id}/cancel"))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&[("cancellation_reason", "requested_by_customer")])
            .send()
            .await?;

        let intent: PaymentIntent = handle_response(response).await?;
        debug!(payment_intent_id = %intent.id, "Cancelled payment intent");
        Ok(intent)
    }

    /// Verify a `Stripe-Signature` header and parse the event.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidSignature` if no webhook secret is
    /// configured or the signature doesn't verify, and `StripeError::Parse`
    /// if the payload isn't an event.
    pub fn construct_event(&self, payload: &str, signature: &str) -> Result<Event, StripeError> {
        let secret = self.inner.webhook_secret.as_ref().ok_or_else(|| {
            StripeError::InvalidSignature("webhook secret not configured".to_string())
        })?;

        verify_signature(
            payload,
            signature,
            secret.expose_secret(),
            chrono::Utc::now().timestamp(),
        )?;

        serde_json::from_str(payload)
            .map_err(|e| StripeError::Parse(format!("Failed to parse event: {e}")))
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| StripeError::Parse(format!("Failed to parse response: {e}")));
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(StripeError::Unauthorized("Invalid API key".to_string()));
    }

    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_error) => Err(StripeError::Api {
            error_type: api_error.error.error_type,
            message: api_error.error.message,
        }),
        Err(_) => Err(StripeError::Api {
            error_type: format!("http_{}", status.as_u16()),
            message: body,
        }),
    }
}

/// Verify a `t=<ts>,v1=<hex>` signature header against `payload`.
///
/// The signed string is `"{t}.{payload}"`. Any `v1` entry may match, which
/// lets Stripe roll secrets.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` on a malformed header, a
/// timestamp outside [`WEBHOOK_TOLERANCE_SECS`] or no matching signature.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("Missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature(
            "Missing v1 signature".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("Invalid timestamp".to_string()))?;

    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(StripeError::InvalidSignature(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !signatures
        .iter()
        .any(|sig| constant_time_compare(&expected, sig))
    {
        return Err(StripeError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }

    debug!("Stripe webhook signature verified");
    Ok(())
}

/// Compare two strings without short-circuiting on the first difference.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    fn sign(timestamp: i64, payload: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("hmac key");
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_valid() {
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(now, PAYLOAD));
        assert!(verify_signature(PAYLOAD, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_signature_any_v1_may_match() {
        let now = 1_700_000_000;
        let header = format!("t={now},v1=deadbeef,v0=ignored,v1={}", sign(now, PAYLOAD));
        assert!(verify_signature(PAYLOAD, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_signature_tampered_payload() {
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(now, PAYLOAD));
        let result = verify_signature(r#"{"id":"evt_2"}"#, &header, SECRET, now);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_signature_too_old() {
        let signed_at = 1_700_000_000;
        let header = format!("t={signed_at},v1={}", sign(signed_at, PAYLOAD));
        let now = signed_at + WEBHOOK_TOLERANCE_SECS + 1;
        assert!(verify_signature(PAYLOAD, &header, SECRET, now).is_err());
        assert!(verify_signature(PAYLOAD, &header, SECRET, now - 1).is_ok());
    }

    #[test]
    fn test_signature_malformed_header() {
        let now = 1_700_000_000;
        assert!(verify_signature(PAYLOAD, "", SECRET, now).is_err());
        assert!(verify_signature(PAYLOAD, "v1=abc", SECRET, now).is_err());
        assert!(verify_signature(PAYLOAD, "t=abc,v1=abc", SECRET, now).is_err());
        assert!(verify_signature(PAYLOAD, &format!("t={now}"), SECRET, now).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
