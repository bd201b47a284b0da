//! Integration tests for health checks and the public catalog.
//!
//! These tests require:
//! - A migrated and seeded database (emporium migrate && emporium seed)
//! - The storefront server running (cargo run -p emporium-storefront)

use emporium_integration_tests::{first_product, session_client, url};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_health_checks() {
    let client = session_client();

    let resp = client.get(url("/health")).send().await.expect("Failed to get health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");

    let resp = client
        .get(url("/health/ready"))
        .send()
        .await
        .expect("Failed to get readiness");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_product_listing_is_paginated() {
    let client = session_client();

    let page: Value = client
        .get(url("/api/products?page=1&per_page=500"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to parse page");

    assert_eq!(page["page"], 1);
    assert_eq!(page["per_page"], 100);
    assert!(page["total"].as_i64().is_some_and(|t| t >= 1));
    for item in page["items"].as_array().expect("items array") {
        assert_eq!(item["is_active"], true);
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_product_detail_by_slug() {
    let client = session_client();
    let product = first_product(&client).await;
    let slug = product["slug"].as_str().expect("slug");

    let detail: Value = client
        .get(url(&format!("/api/products/{slug}")))
        .send()
        .await
        .expect("Failed to get product")
        .json()
        .await
        .expect("Failed to parse product");

    assert_eq!(detail["id"], product["id"]);
    assert!(detail["categories"].is_array());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_unknown_product_and_endpoint_are_json_404() {
    let client = session_client();

    for path in ["/api/products/no-such-product-anywhere", "/api/nope"] {
        let resp = client.get(url(path)).send().await.expect("Failed to send");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
        let body: Value = resp.json().await.expect("Failed to parse error");
        assert!(body["error"].is_string(), "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_category_lists_its_products() {
    let client = session_client();

    let categories: Value = client
        .get(url("/api/categories"))
        .send()
        .await
        .expect("Failed to list categories")
        .json()
        .await
        .expect("Failed to parse categories");
    let first = categories
        .as_array()
        .and_then(|c| c.first())
        .cloned()
        .expect("No categories; run `emporium seed` first");
    let slug = first["slug"].as_str().expect("slug");

    let detail: Value = client
        .get(url(&format!("/api/categories/{slug}")))
        .send()
        .await
        .expect("Failed to get category")
        .json()
        .await
        .expect("Failed to parse category");

    assert_eq!(detail["category"]["slug"], slug);
    assert!(detail["products"]["items"].is_array());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_api_responses_carry_security_headers() {
    let client = session_client();
    let resp = client
        .get(url("/api/categories"))
        .send()
        .await
        .expect("Failed to list categories");

    let headers = resp.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
}
