//! Integration tests for the `PostgreSQL` store.
//!
//! These need a live server. Each test gets a fresh database with the
//! migrations applied:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/harvest cargo test -p harvest-integration-tests \
//!     --test pg_store -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use harvest_api::db::{InventoryStore, OrderStore, PgStore, RepositoryError, UserStore};
use harvest_api::models::{
    Identity, NewOrder, NewOrderLine, NewShopOrder, NewUser, OrderFilter, Product,
};
use harvest_api::services::orders::{ChangeOrderRequest, OrderError, OrderService};
use harvest_core::{Codename, Email, Money, OrderStatus, Permissions, Role};
use harvest_integration_tests::guest_cart;

/// A farmer with one shop and the given `(name, price, stock)` products.
async fn seed(store: &PgStore, products: &[(&str, &str, i32)]) -> Vec<Product> {
    let farmer = store
        .create_user(&NewUser {
            email: Email::parse("fern@harvest.test").unwrap(),
            name: "Fern".to_string(),
            permissions: Permissions::only(Role::Farmer),
            temporary: false,
        })
        .await
        .unwrap();
    let shop = store.create_shop(farmer.id, "Green Acres").await.unwrap();

    let mut created = Vec::new();
    for (name, price, stock) in products {
        let price: Decimal = price.parse().unwrap();
        created.push(
            store
                .create_product(shop.id, name, price, *stock)
                .await
                .unwrap(),
        );
    }
    created
}

fn new_order(email: &str, guest: bool, lines: &[(&Product, i32)]) -> NewOrder {
    let email = Email::parse(email).unwrap();
    let total: Decimal = lines
        .iter()
        .map(|(product, quantity)| product.price * Decimal::from(*quantity))
        .sum();
    NewOrder {
        codename: Codename::order_identifier(),
        temporary_buyer: guest.then(|| NewUser::temporary(email.clone())),
        email,
        note: String::new(),
        address: "1 Orchard Lane".to_string(),
        payment_type: "cash".to_string(),
        total_price: Money::from_decimal(total),
        cancel_if_missing: false,
        shop_orders: vec![NewShopOrder {
            shop_id: lines[0].0.shop_id,
            lines: lines
                .iter()
                .map(|(product, quantity)| NewOrderLine {
                    product_id: product.id,
                    codename: product.codename.clone(),
                    quantity: *quantity,
                    unit_price: product.price,
                })
                .collect(),
        }],
    }
}

async fn stock(store: &PgStore, codename: &str) -> i32 {
    let products = store
        .products_by_codename(&[Codename::parse(codename).unwrap()])
        .await
        .unwrap();
    products[0].quantity
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_placements_split_last_units(pool: PgPool) {
    let store = PgStore::new(pool);
    let products = seed(&store, &[("Widget", "10.00", 2)]).await;
    let widget = &products[0];

    let first = tokio::spawn({
        let store = store.clone();
        let order = new_order("alice@example.com", false, &[(widget, 2)]);
        async move { store.insert_order(order).await }
    });
    let second = tokio::spawn({
        let store = store.clone();
        let order = new_order("bob@example.com", false, &[(widget, 2)]);
        async move { store.insert_order(order).await }
    });
    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        failure,
        RepositoryError::OutOfStock { available: 0, .. }
    ));
    assert_eq!(stock(&store, "widget").await, 0);
    assert_eq!(
        store.list_orders(&OrderFilter::default()).await.unwrap().len(),
        1
    );
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_short_line_rolls_back_whole_placement(pool: PgPool) {
    let store = PgStore::new(pool);
    let products = seed(&store, &[("Kale", "3.50", 40), ("Widget", "10.00", 1)]).await;
    let (kale, widget) = (&products[0], &products[1]);

    let err = store
        .insert_order(new_order(
            "guest@example.com",
            true,
            &[(kale, 5), (widget, 3)],
        ))
        .await
        .unwrap_err();

    let RepositoryError::OutOfStock { product, available } = err else {
        panic!("expected out of stock, got {err:?}");
    };
    assert_eq!(product.as_str(), "widget");
    assert_eq!(available, 1);

    assert_eq!(stock(&store, "kale").await, 40);
    assert_eq!(stock(&store, "widget").await, 1);
    let guest = Email::parse("guest@example.com").unwrap();
    assert!(store.user_by_email(&guest).await.unwrap().is_none());
    assert!(
        store
            .list_orders(&OrderFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_completion_and_rejected_reopen_persist(pool: PgPool) {
    let store = PgStore::new(pool);
    seed(&store, &[("Kale", "3.50", 40)]).await;
    let service = OrderService::new(&store);
    let admin = Identity::new(
        Email::parse("admin@harvest.test").unwrap(),
        Permissions::only(Role::Admin),
    );
    let guest = Email::parse("guest@example.com").unwrap();
    let complete = ChangeOrderRequest {
        status: Some(OrderStatus::Completed),
        ..ChangeOrderRequest::default()
    };

    let order = service
        .place_order(None, guest_cart("guest@example.com", &[("kale", 2)]))
        .await
        .unwrap();
    let codename = order.order.codename.to_string();
    assert_eq!(stock(&store, "kale").await, 38);

    service
        .change_order(&admin, &codename, complete.clone())
        .await
        .unwrap();
    assert!(store.user_by_email(&guest).await.unwrap().is_none());

    let err = service
        .change_order(
            &admin,
            &codename,
            ChangeOrderRequest {
                status: Some(OrderStatus::Placed),
                pickup_date: Some("2026-05-01".to_string()),
                ..ChangeOrderRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition(_)));

    // The rejected edit wrote nothing, not even the pickup date
    let listed = store.list_orders(&OrderFilter::default()).await.unwrap();
    assert_eq!(listed[0].order.status, OrderStatus::Completed);
    assert!(listed[0].order.pickup_date.is_none());

    // A returning guest gets a fresh identity that completion of the old order leaves alone
    service
        .place_order(None, guest_cart("guest@example.com", &[("kale", 1)]))
        .await
        .unwrap();
    service
        .change_order(&admin, &codename, complete)
        .await
        .unwrap();
    assert!(store.user_by_email(&guest).await.unwrap().unwrap().temporary);
}
