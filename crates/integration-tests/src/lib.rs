//! Integration tests for Emporium.
//!
//! Most tests talk to a running storefront over HTTP; the `storefront_database`
//! suite goes straight to the repositories. All are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare a database with the sample catalog
//! cargo run -p emporium-cli -- migrate
//! cargo run -p emporium-cli -- seed
//!
//! # Start the server, then run the ignored tests
//! cargo run -p emporium-storefront
//! cargo test -p emporium-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_BASE_URL` overrides the default `http://localhost:3000`.
//! Database tests read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use emporium_storefront::{config::get_database_url, db};

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Build a full API URL from a path such as `/api/cart`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", storefront_base_url())
}

/// Register a fresh account on `client`, leaving it logged in.
///
/// Returns the user JSON and the password used.
///
/// # Panics
///
/// Panics if registration does not return 201.
pub async fn register_user(client: &Client) -> (Value, String) {
    let short = unique_suffix();
    let password = format!("Correct-Horse-{short}");

    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": format!("test-{short}@example.com"),
            "username": format!("test_{short}"),
            "password": password,
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED, "registration failed");
    let user = resp.json().await.expect("Failed to parse user");
    (user, password)
}

/// The first product of the public listing.
///
/// # Panics
///
/// Panics if the catalog is empty; run `emporium seed` first.
pub async fn first_product(client: &Client) -> Value {
    let page: Value = client
        .get(url("/api/products?per_page=1&sort=name"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to parse product page");

    page["items"]
        .as_array()
        .and_then(|items| items.first())
        .cloned()
        .expect("Catalog is empty; run `emporium seed` first")
}

/// A shipping address accepted by checkout.
#[must_use]
pub fn sample_address() -> Value {
    json!({
        "full_name": "Ada Tester",
        "street_line1": "1 Integration Way",
        "city": "Portland",
        "province": "OR",
        "country": "US",
        "zip": "97201"
    })
}

/// Connect to the storefront database.
///
/// # Panics
///
/// Panics if no database URL is set or the connection fails.
pub async fn database_pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = get_database_url("STOREFRONT_DATABASE_URL").expect("Database URL not set");
    db::create_pool(&url)
        .await
        .expect("Failed to connect to database")
}

/// A short random suffix for unique emails, SKUs and codes.
#[must_use]
pub fn unique_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id.get(..12).unwrap_or(&id).to_owned()
}
