//! Database integration tests for catalog sync, inventory, carts and referrals.
//!
//! These tests require a migrated `PostgreSQL` database (emporium migrate)
//! reachable through `STOREFRONT_DATABASE_URL` or `DATABASE_URL`. They do not
//! need the server.

use rust_decimal::Decimal;
use sqlx::PgPool;

use emporium_core::{Email, OrderTotals, Slug};
use emporium_integration_tests::{database_pool, unique_suffix};
use emporium_storefront::db::orders::PlaceOrderError;
use emporium_storefront::db::products::ProductRecord;
use emporium_storefront::db::referrals::RedemptionOutcome;
use emporium_storefront::db::users::NewUser;
use emporium_storefront::db::carts::MAX_LINE_QUANTITY;
use emporium_storefront::db::{
    CartRepository, OrderRepository, ProductRepository, ReferralRepository, UserRepository,
};
use emporium_storefront::models::{
    AddressSnapshot, CartOwner, NewOrder, NewOrderItem, NewReferral, Product, User,
};
use emporium_storefront::sync::{ProductSource, SupplierProduct, SyncError, run_sync};

struct FixedSource {
    products: Vec<SupplierProduct>,
}

impl ProductSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_products(&self) -> Result<Vec<SupplierProduct>, SyncError> {
        Ok(self.products.clone())
    }
}

fn supplier_product(sku: &str, price: Decimal) -> SupplierProduct {
    SupplierProduct {
        supplier: "fixed".to_owned(),
        supplier_sku: sku.to_owned(),
        name: format!("Sync Test Lamp {sku}"),
        description: "A lamp from the sync test".to_owned(),
        price,
        compare_at_price: None,
        image_url: None,
        affiliate_url: None,
        inventory: 5,
        category_slug: None,
    }
}

async fn create_user(pool: &PgPool, label: &str) -> User {
    let suffix = unique_suffix();
    let new_user = NewUser {
        email: Email::parse(&format!("{label}-{suffix}@example.com")).expect("valid email"),
        username: format!("{label}_{suffix}"),
        first_name: None,
        last_name: None,
    };
    UserRepository::new(pool)
        .create_with_password(&new_user, "not-a-real-hash")
        .await
        .expect("Failed to create user")
}

async fn create_product(pool: &PgPool, inventory: i32) -> Product {
    let suffix = unique_suffix();
    let record = ProductRecord {
        name: format!("Stock Test Mug {suffix}"),
        slug: Slug::parse(&format!("stock-test-mug-{suffix}")).expect("valid slug"),
        description: "A mug from the stock test".to_owned(),
        price: Decimal::new(1250, 2),
        compare_at_price: None,
        image_url: None,
        images: Vec::new(),
        inventory,
        is_active: true,
        is_featured: false,
        affiliate_url: None,
    };
    ProductRepository::new(pool)
        .create(&record)
        .await
        .expect("Failed to create product")
}

fn new_order(user: Option<&User>, total: Decimal) -> NewOrder {
    NewOrder {
        order_number: format!("EMP-TEST-{}", unique_suffix().to_uppercase()),
        user_id: user.map(|u| u.id),
        email: user.map_or_else(|| "guest@example.com".to_owned(), |u| u.email.to_string()),
        totals: OrderTotals {
            subtotal: total,
            discount_total: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            total,
        },
        currency: "usd".to_owned(),
        shipping_address: AddressSnapshot {
            full_name: "Ada Tester".to_owned(),
            street_line1: "1 Integration Way".to_owned(),
            street_line2: None,
            city: "Portland".to_owned(),
            province: Some("OR".to_owned()),
            country: "US".to_owned(),
            zip: "97201".to_owned(),
            phone: None,
        },
        billing_address: None,
        referral_id: None,
        notes: None,
    }
}

fn line(product: &Product, quantity: i32) -> NewOrderItem {
    NewOrderItem {
        product_id: product.id,
        product_name: product.name.clone(),
        unit_price: product.price,
        quantity,
        line_total: product.price * Decimal::from(quantity),
    }
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_resync_updates_existing_product() {
    let pool = database_pool().await;
    let sku = format!("fixed-{}", unique_suffix());

    let first = FixedSource {
        products: vec![supplier_product(&sku, Decimal::new(1999, 2))],
    };
    let report = run_sync(&pool, &first).await.expect("First sync failed");
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);

    let repo = ProductRepository::new(&pool);
    let id = repo
        .find_id_by_supplier_sku(&sku)
        .await
        .expect("Lookup failed")
        .expect("Synced product missing");

    // Only the price changes between runs
    let second = FixedSource {
        products: vec![supplier_product(&sku, Decimal::new(2499, 2))],
    };
    let report = run_sync(&pool, &second).await.expect("Second sync failed");
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);

    assert_eq!(
        repo.find_id_by_supplier_sku(&sku).await.expect("Lookup failed"),
        Some(id)
    );
    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM storefront.product WHERE supplier_sku = $1")
            .bind(&sku)
            .fetch_one(&pool)
            .await
            .expect("Count failed");
    assert_eq!(rows, 1);

    let product = repo
        .get_by_id(id)
        .await
        .expect("Lookup failed")
        .expect("Product missing");
    assert_eq!(product.price, Decimal::new(2499, 2));
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_order_cannot_take_more_than_stock() {
    let pool = database_pool().await;
    let product = create_product(&pool, 1).await;
    let orders = OrderRepository::new(&pool);

    let result = orders
        .create(
            &new_order(None, product.price * Decimal::from(2)),
            &[line(&product, 2)],
            None,
        )
        .await;
    assert!(matches!(
        result,
        Err(PlaceOrderError::InsufficientInventory(id)) if id == product.id
    ));

    let products = ProductRepository::new(&pool);
    let after = products
        .get_by_id(product.id)
        .await
        .expect("Lookup failed")
        .expect("Product missing");
    assert_eq!(after.inventory, 1);

    orders
        .create(&new_order(None, product.price), &[line(&product, 1)], None)
        .await
        .expect("Order within stock failed");
    let after = products
        .get_by_id(product.id)
        .await
        .expect("Lookup failed")
        .expect("Product missing");
    assert_eq!(after.inventory, 0);
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_referral_discount_applies_to_one_order() {
    let pool = database_pool().await;
    let owner = create_user(&pool, "owner").await;
    let buyer = create_user(&pool, "buyer").await;

    let referrals = ReferralRepository::new(&pool);
    let referral = referrals
        .create(&NewReferral {
            code: unique_suffix().to_uppercase().chars().take(8).collect(),
            owner_user_id: owner.id,
            discount_percent: 10,
            max_uses: None,
            expires_at: None,
        })
        .await
        .expect("Failed to create referral");

    assert_eq!(
        referrals
            .record_redemption(referral.id, buyer.id)
            .await
            .expect("Redemption failed"),
        RedemptionOutcome::Redeemed
    );

    let mut discounted = new_order(Some(&buyer), Decimal::new(900, 2));
    discounted.referral_id = Some(referral.id);

    let orders = OrderRepository::new(&pool);
    orders
        .create(&discounted, &[], None)
        .await
        .expect("First discounted order failed");

    // A second order claiming the same redemption is refused
    discounted.order_number = format!("EMP-TEST-{}", unique_suffix().to_uppercase());
    let result = orders.create(&discounted, &[], None).await;
    assert!(matches!(result, Err(PlaceOrderError::DiscountAlreadyUsed)));

    let second_saved: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM storefront.order WHERE order_number = $1")
            .bind(&discounted.order_number)
            .fetch_one(&pool)
            .await
            .expect("Count failed");
    assert_eq!(second_saved, 0);

    assert!(
        referrals
            .pending_discount_for_user(buyer.id)
            .await
            .expect("Lookup failed")
            .is_none()
    );
}

#[tokio::test]
#[ignore = "Requires migrated database"]
async fn test_cart_line_never_exceeds_cap() {
    let pool = database_pool().await;
    let product = create_product(&pool, 5).await;
    let carts = CartRepository::new(&pool);

    let guest_token = format!("guest-{}", unique_suffix());
    let guest_cart = carts
        .find_or_create(&CartOwner::Guest(guest_token.clone()))
        .await
        .expect("Failed to create cart");

    carts
        .add_item(guest_cart, product.id, MAX_LINE_QUANTITY - 1)
        .await
        .expect("Add failed");
    let total = carts
        .add_item(guest_cart, product.id, 5)
        .await
        .expect("Add failed");
    assert_eq!(total, MAX_LINE_QUANTITY);

    // Merging into a cart that already holds the product stays capped too
    let user = create_user(&pool, "merger").await;
    let user_cart = carts
        .find_or_create(&CartOwner::User(user.id))
        .await
        .expect("Failed to create cart");
    carts
        .add_item(user_cart, product.id, 10)
        .await
        .expect("Add failed");

    carts
        .merge_guest_into_user(&guest_token, user.id)
        .await
        .expect("Merge failed");
    assert_eq!(
        carts
            .quantity_of(user_cart, product.id)
            .await
            .expect("Lookup failed"),
        Some(MAX_LINE_QUANTITY)
    );
}
