//! Integration tests for carts, checkout and order history.
//!
//! These tests require:
//! - A migrated and seeded database (emporium migrate && emporium seed)
//! - The storefront server running (cargo run -p emporium-storefront)

use emporium_integration_tests::{
    first_product, register_user, sample_address, session_client, url,
};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

async fn add_to_cart(client: &Client, product_id: &Value, quantity: i32) -> Value {
    let resp = client
        .post(url("/api/cart/items"))
        .json(&json!({"product_id": product_id, "quantity": quantity}))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse cart")
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("decimal string")
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_cart_lifecycle() {
    let client = session_client();
    let product = first_product(&client).await;
    let product_id = &product["id"];

    let cart = add_to_cart(&client, product_id, 1).await;
    assert_eq!(cart["item_count"], 1);

    // Adding again increases the quantity of the same line
    let cart = add_to_cart(&client, product_id, 1).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["item_count"], 2);

    let resp = client
        .put(url(&format!("/api/cart/items/{product_id}")))
        .json(&json!({"quantity": 0}))
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .delete(url(&format!("/api/cart/items/{product_id}")))
        .send()
        .await
        .expect("Failed to remove item");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.expect("Failed to parse cart");
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_checkout_requires_email_and_empties_cart() {
    let client = session_client();
    let product = first_product(&client).await;
    add_to_cart(&client, &product["id"], 1).await;

    let resp = client
        .post(url("/api/orders"))
        .json(&json!({"shipping_address": sample_address()}))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(url("/api/orders"))
        .json(&json!({
            "shipping_address": sample_address(),
            "email": "guest-buyer@example.com"
        }))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let order: Value = resp.json().await.expect("Failed to parse order");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "unpaid");
    assert_eq!(
        decimal(&order["total"]),
        decimal(&order["subtotal"]) - decimal(&order["discount_total"])
            + decimal(&order["shipping_total"])
    );

    let cart: Value = client
        .get(url("/api/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_stale_expected_total_is_rejected() {
    let client = session_client();
    let product = first_product(&client).await;
    add_to_cart(&client, &product["id"], 1).await;

    let resp = client
        .post(url("/api/orders"))
        .json(&json!({
            "shipping_address": sample_address(),
            "email": "guest-buyer@example.com",
            "expected_total": "0.01"
        }))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_cart_follows_user_and_order_can_be_cancelled() {
    let client = session_client();
    let product = first_product(&client).await;
    add_to_cart(&client, &product["id"], 1).await;

    // Registering merges the guest cart into the new account
    register_user(&client).await;
    let cart: Value = client
        .get(url("/api/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["item_count"], 1);

    let resp = client
        .post(url("/api/orders"))
        .json(&json!({"shipping_address": sample_address()}))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("Failed to parse order");
    let order_id = &order["id"];

    let orders: Value = client
        .get(url("/api/orders"))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to parse orders");
    assert!(
        orders
            .as_array()
            .is_some_and(|list| list.iter().any(|o| &o["id"] == order_id))
    );

    let resp = client
        .post(url(&format!("/api/orders/{order_id}/cancel")))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled: Value = resp.json().await.expect("Failed to parse order");
    assert_eq!(cancelled["status"], "cancelled");

    // Cancelling twice is a conflict
    let resp = client
        .post(url(&format!("/api/orders/{order_id}/cancel")))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_chat_validates_and_answers() {
    let client = session_client();

    let resp = client
        .post(url("/api/chat"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .expect("Failed to send chat");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(url("/api/chat"))
        .json(&json!({"message": "Do you sell mugs?"}))
        .send()
        .await
        .expect("Failed to send chat");
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: Value = resp.json().await.expect("Failed to parse reply");
    assert!(reply["reply"].as_str().is_some_and(|r| !r.is_empty()));
    assert!(reply["products"].is_array());
}
