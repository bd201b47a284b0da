//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_STATIC_DIR` - Built single-page app served for non-API paths
//! - `STOREFRONT_CURRENCY` - ISO currency code sent to Stripe (default: usd)
//! - `STOREFRONT_SHIPPING_FLAT_RATE` - Flat shipping charge (default: 5.99)
//! - `STOREFRONT_FREE_SHIPPING_THRESHOLD` - Free shipping at or above (default: 50.00)
//! - `STRIPE_SECRET_KEY` / `STRIPE_WEBHOOK_SECRET` - Enables card payments
//! - `GEMINI_API_KEY` / `GEMINI_MODEL` - Enables the support chat assistant
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking
//!
//! Supplier sync settings live in [`SyncConfig`] and are only read by the CLI.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use emporium_core::ShippingPolicy;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_WHOLESALE2B_BASE_URL: &str = "https://www.wholesale2b.com/api/v1";
const DEFAULT_SYNC_MAX_ATTEMPTS: u32 = 3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Directory holding the built client application, if served by us
    pub static_dir: Option<PathBuf>,
    /// Lowercase ISO 4217 currency code
    pub currency: String,
    /// Shipping charge rules applied at checkout
    pub shipping: ShippingPolicy,
    /// Stripe settings; `None` disables payment endpoints
    pub payments: Option<PaymentsConfig>,
    /// Gemini settings; `None` makes chat answer with the fallback reply
    pub chat: Option<ChatConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Stripe API credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Server-side secret key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Gemini chat completion settings.
#[derive(Clone)]
pub struct ChatConfig {
    /// API key sent in the `x-goog-api-key` header
    pub api_key: SecretString,
    /// Model name, e.g. `gemini-1.5-flash`
    pub model: String,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let shipping = ShippingPolicy {
            flat_rate: parse_env_or_default::<Decimal>("STOREFRONT_SHIPPING_FLAT_RATE", "5.99")?,
            free_threshold: parse_env_or_default::<Decimal>(
                "STOREFRONT_FREE_SHIPPING_THRESHOLD",
                "50.00",
            )?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            static_dir: get_optional_env("STOREFRONT_STATIC_DIR").map(PathBuf::from),
            currency: get_env_or_default("STOREFRONT_CURRENCY", "usd").to_lowercase(),
            shipping,
            payments: PaymentsConfig::from_env()?,
            chat: ChatConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = get_optional_validated_secret("STRIPE_SECRET_KEY")? else {
            return Ok(None);
        };
        Ok(Some(Self {
            secret_key,
            webhook_secret: get_optional_validated_secret("STRIPE_WEBHOOK_SECRET")?,
        }))
    }
}

impl ChatConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_validated_secret("GEMINI_API_KEY")? else {
            return Ok(None);
        };
        Ok(Some(Self {
            api_key,
            model: get_env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        }))
    }
}

// =============================================================================
// Supplier Sync
// =============================================================================

/// Supplier credentials and retry policy for catalog sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Rakuten Advertising credentials, if configured
    pub rakuten: Option<RakutenConfig>,
    /// Wholesale2b credentials, if configured
    pub wholesale2b: Option<Wholesale2bConfig>,
    /// Attempts per remote call before giving up
    pub max_attempts: u32,
}

/// Rakuten Advertising product search credentials.
#[derive(Clone)]
pub struct RakutenConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Publisher account ID, sent as the token scope
    pub account_id: String,
}

impl std::fmt::Debug for RakutenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RakutenConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Wholesale2b product feed credentials.
#[derive(Clone)]
pub struct Wholesale2bConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

impl std::fmt::Debug for Wholesale2bConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wholesale2bConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SyncConfig {
    /// Load supplier sync settings from environment variables.
    ///
    /// A supplier whose credentials are absent is left as `None`; asking to
    /// sync it fails later with a clear error instead of here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a partially configured supplier is missing a
    /// required variable or `SYNC_MAX_ATTEMPTS` is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let rakuten = match get_optional_env("RAKUTEN_CLIENT_ID") {
            Some(client_id) => Some(RakutenConfig {
                client_id,
                client_secret: get_required_secret("RAKUTEN_CLIENT_SECRET")?,
                account_id: get_required_env("RAKUTEN_ACCOUNT_ID")?,
            }),
            None => None,
        };

        let wholesale2b = get_optional_env("WHOLESALE2B_API_KEY").map(|key| Wholesale2bConfig {
            api_key: SecretString::from(key),
            base_url: get_env_or_default("WHOLESALE2B_BASE_URL", DEFAULT_WHOLESALE2B_BASE_URL),
        });

        let max_attempts = parse_env_or_default::<u32>(
            "SYNC_MAX_ATTEMPTS",
            &DEFAULT_SYNC_MAX_ATTEMPTS.to_string(),
        )?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            rakuten,
            wholesale2b,
            max_attempts,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` naming `primary_key` if neither is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Load and validate a secret that may be absent.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    match get_optional_env(key) {
        Some(value) => {
            validate_secret_strength(&value, key)?;
            Ok(Some(SecretString::from(value)))
        }
        None => Ok(None),
    }
}
