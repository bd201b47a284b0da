//! Integration tests for account registration and sessions.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (emporium migrate)
//! - The storefront server running (cargo run -p emporium-storefront)
//!
//! Login and registration are rate limited per IP, so keep the number of
//! credential requests in this suite small.

use emporium_integration_tests::{register_user, session_client, url};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_logout_login_flow() {
    let client = session_client();
    let (user, password) = register_user(&client).await;
    assert_eq!(user["is_admin"], false);

    let me: Value = client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("Failed to get current user")
        .json()
        .await
        .expect("Failed to parse user");
    assert_eq!(me["id"], user["id"]);

    let resp = client
        .post(url("/api/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("Failed to get current user");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(url("/api/auth/login"))
        .json(&json!({"email": user["email"], "password": password}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("Failed to get current user");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_login_with_unknown_account_is_unauthorized() {
    let client = session_client();

    let resp = client
        .post(url("/api/auth/login"))
        .json(&json!({"email": "nobody-here@example.com", "password": "definitely-wrong"}))
        .send()
        .await
        .expect("Failed to send login");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_account_endpoints_require_login() {
    let client = session_client();

    for path in ["/api/orders", "/api/addresses", "/api/referrals"] {
        let resp = client
            .get(url(path))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }

    let resp = client
        .post(url("/api/products"))
        .json(&json!({"name": "Sneaky", "price": "1.00"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
