//! Integration tests for the HTTP surface.
//!
//! Requests go through the full router with the caller's identity placed in
//! the request extensions, the way the session middleware would.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use harvest_integration_tests::{Market, buyer, send};

fn guest_checkout(email: &str, lines: &[(&str, i32)]) -> Value {
    let ordered: Vec<Value> = lines
        .iter()
        .map(|(codename, quantity)| json!({ "product": { "codename": codename }, "quantity": quantity }))
        .collect();
    json!({
        "user": { "email": email, "temporary": true },
        "note": "leave at the gate",
        "address": "1 Orchard Lane",
        "paymentType": "cash",
        "cancelIfMissing": false,
        "orderedProducts": ordered,
    })
}

#[tokio::test]
async fn test_health() {
    let market = Market::new();

    let (status, _) = send(market.app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(market.app(), Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_guest_places_order() {
    let market = Market::new();

    let (status, body) = send(
        market.app(),
        Method::POST,
        "/orders",
        None,
        Some(guest_checkout("guest@example.com", &[("widget", 2), ("gadget", 1)])),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["totalPrice"], "25.00");
    assert_eq!(body["status"], 1);
    assert_eq!(body["email"], "guest@example.com");
    assert_eq!(body["shopOrders"].as_array().unwrap().len(), 2);
    assert_eq!(body["orderedProducts"].as_array().unwrap().len(), 2);
    assert_eq!(body["codename"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn test_short_stock_reports_lines() {
    let market = Market::new();

    let (status, body) = send(
        market.app(),
        Method::POST,
        "/orders",
        None,
        Some(guest_checkout("guest@example.com", &[("widget", 9)])),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["payload"]["widget"], "product only has 3 available units");
    assert_eq!(market.stock("widget"), 3);
}

#[tokio::test]
async fn test_guest_with_taken_email_conflicts() {
    let market = Market::new();

    let (status, body) = send(
        market.app(),
        Method::POST,
        "/orders",
        None,
        Some(guest_checkout("admin@harvest.test", &[("kale", 1)])),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let market = Market::new();

    let (status, body) = send(
        market.app(),
        Method::POST,
        "/orders",
        None,
        Some(json!({ "address": 12 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_listing_requires_sign_in() {
    let market = Market::new();

    let (status, body) = send(market.app(), Method::GET, "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "sign in required");
}

#[tokio::test]
async fn test_buyer_lists_and_cancels_own_order() {
    let market = Market::new();
    let alice = buyer("alice@example.com");
    let (_, placed) = send(
        market.app(),
        Method::POST,
        "/orders",
        Some(&alice),
        Some(guest_checkout("ignored@example.com", &[("kale", 2)])),
    )
    .await;
    let codename = placed["codename"].as_str().unwrap();

    let (status, body) = send(market.app(), Method::GET, "/orders", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let uri = format!("/orders/{codename}/cancel");
    let (status, _) = send(
        market.app(),
        Method::PUT,
        &uri,
        Some(&buyer("mallory@example.com")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(market.app(), Method::PUT, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 5);
    assert_eq!(body["shopOrders"][0]["status"], 3);
}

#[tokio::test]
async fn test_unknown_status_code_is_rejected() {
    let market = Market::new();
    let (_, placed) = send(
        market.app(),
        Method::POST,
        "/orders",
        None,
        Some(guest_checkout("guest@example.com", &[("kale", 1)])),
    )
    .await;
    let uri = format!("/orders/{}", placed["codename"].as_str().unwrap());

    let (status, _) = send(
        market.app(),
        Method::PUT,
        &uri,
        Some(&market.admin),
        Some(json!({ "status": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        market.app(),
        Method::PUT,
        &uri,
        Some(&market.admin),
        Some(json!({ "status": 2, "deliverer": "courier@harvest.test", "pickupDate": "2026-05-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 2);
    assert_eq!(body["pickupDate"], "2026-05-01");
}

#[tokio::test]
async fn test_buyer_cannot_change_order() {
    let market = Market::new();
    let alice = buyer("alice@example.com");
    let (_, placed) = send(
        market.app(),
        Method::POST,
        "/orders",
        Some(&alice),
        Some(guest_checkout("alice@example.com", &[("kale", 1)])),
    )
    .await;
    let uri = format!("/orders/{}", placed["codename"].as_str().unwrap());

    let (status, _) = send(
        market.app(),
        Method::PUT,
        &uri,
        Some(&alice),
        Some(json!({ "status": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Shops and Couriers
// =============================================================================

#[tokio::test]
async fn test_farmer_accepts_shop_order() {
    let market = Market::new();
    send(
        market.app(),
        Method::POST,
        "/orders",
        None,
        Some(guest_checkout("guest@example.com", &[("kale", 1)])),
    )
    .await;

    let (status, listings) =
        send(market.app(), Method::GET, "/shop/orders", Some(&market.farmer_a), None).await;
    assert_eq!(status, StatusCode::OK);
    let id = listings[0]["id"].as_str().unwrap();
    assert_eq!(listings[0]["orderedProducts"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        market.app(),
        Method::PUT,
        &format!("/shop/orders/{id}"),
        Some(&market.farmer_a),
        Some(json!({ "status": 1, "message": "packed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The only shop accepted, so the order moves to fulfilling
    assert_eq!(body["status"], 3);
    assert_eq!(body["shopOrders"][0]["message"], "packed");
}

#[tokio::test]
async fn test_malformed_shop_order_id_is_not_found() {
    let market = Market::new();

    let (status, _) = send(
        market.app(),
        Method::PUT,
        "/shop/orders/not-an-id",
        Some(&market.farmer_a),
        Some(json!({ "status": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_courier_listing_is_admin_only() {
    let market = Market::new();

    let (status, body) =
        send(market.app(), Method::GET, "/couriers", Some(&market.courier), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].is_string());

    let (status, body) =
        send(market.app(), Method::GET, "/couriers", Some(&market.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_courier_routes() {
    let market = Market::new();

    let (status, body) = send(
        market.app(),
        Method::GET,
        "/courier/deliveries",
        Some(&market.courier),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = send(
        market.app(),
        Method::GET,
        "/courier/pickups",
        Some(&market.farmer_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
