//! Integration tests for the harvest order fulfillment engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p harvest-integration-tests
//! ```
//!
//! Everything except `pg_store` runs against [`MemoryStore`], so no database
//! is needed. The `pg_store` tests are ignored unless run with `--ignored`
//! and a `DATABASE_URL`.
//!
//! # Test Categories
//!
//! - `order_placement` - cart validation, stock and totals
//! - `order_lifecycle` - status transitions and their cascades
//! - `order_queries` - role-scoped listings
//! - `http_api` - the axum router end to end
//! - `pg_store` - placement and mutation SQL against `PostgreSQL`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use rust_decimal::Decimal;
use tower::ServiceExt;

use harvest_api::db::MemoryStore;
use harvest_api::models::{Identity, NewUser, Shop};
use harvest_api::routes;
use harvest_api::services::orders::{
    BuyerRequest, OrderService, OrderedProductRequest, PlaceOrderRequest, ProductRef,
};
use harvest_api::state::AppState;
use harvest_core::{Codename, Email, Permissions, Role};

/// A seeded marketplace.
///
/// | Shop | Product | Price | Stock |
/// |------|---------|-------|-------|
/// | Green Acres | widget | 10.00 | 3 |
/// | Green Acres | kale | 3.50 | 40 |
/// | Hillside Dairy | gadget | 5.00 | 10 |
pub struct Market {
    /// Shared store.
    pub store: Arc<MemoryStore>,
    /// Admin identity.
    pub admin: Identity,
    /// Courier identity.
    pub courier: Identity,
    /// Second courier identity.
    pub other_courier: Identity,
    /// Owner of Green Acres.
    pub farmer_a: Identity,
    /// Owner of Hillside Dairy.
    pub farmer_b: Identity,
    /// Green Acres.
    pub shop_a: Shop,
    /// Hillside Dairy.
    pub shop_b: Shop,
}

impl Market {
    /// Seed a fresh store.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());

        let admin = staff(&store, "admin@harvest.test", Role::Admin);
        let courier = staff(&store, "courier@harvest.test", Role::Courier);
        let other_courier = staff(&store, "rider@harvest.test", Role::Courier);
        let farmer_a = staff(&store, "fern@harvest.test", Role::Farmer);
        let farmer_b = staff(&store, "dale@harvest.test", Role::Farmer);

        let shop_a = shop(&store, &farmer_a, "Green Acres");
        let shop_b = shop(&store, &farmer_b, "Hillside Dairy");

        for (shop, name, cents, quantity) in [
            (&shop_a, "Widget", 1000, 3),
            (&shop_a, "Kale", 350, 40),
            (&shop_b, "Gadget", 500, 10),
        ] {
            store
                .create_product(shop.id, name, Decimal::new(cents, 2), quantity)
                .unwrap();
        }

        Self {
            store,
            admin,
            courier,
            other_courier,
            farmer_a,
            farmer_b,
            shop_a,
            shop_b,
        }
    }

    /// Order engine over the shared store.
    #[must_use]
    pub fn service(&self) -> OrderService<'_> {
        OrderService::new(&*self.store)
    }

    /// Application state over the shared store.
    #[must_use]
    pub fn state(&self) -> AppState {
        AppState::new(self.store.clone())
    }

    /// Router over the shared store.
    #[must_use]
    pub fn app(&self) -> Router {
        routes::app(self.state())
    }

    /// Remaining stock of a product.
    #[must_use]
    pub fn stock(&self, codename: &str) -> i32 {
        self.store
            .product(&Codename::parse(codename).unwrap())
            .unwrap()
            .quantity
    }

    /// Register a buyer account and return its identity.
    #[must_use]
    pub fn registered_buyer(&self, email: &str) -> Identity {
        self.store
            .create_user(&NewUser {
                email: Email::parse(email).unwrap(),
                name: "Buyer".to_string(),
                permissions: Permissions::none(),
                temporary: false,
            })
            .unwrap();
        buyer(email)
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}

fn staff(store: &MemoryStore, email: &str, role: Role) -> Identity {
    let user = store
        .create_user(&NewUser {
            email: Email::parse(email).unwrap(),
            name: role.to_string(),
            permissions: Permissions::only(role),
            temporary: false,
        })
        .unwrap();
    Identity::new(user.email, user.permissions)
}

fn shop(store: &MemoryStore, owner: &Identity, name: &str) -> Shop {
    let user = store.user(&owner.email).unwrap();
    store.create_shop(user.id, name).unwrap()
}

/// Identity of a buyer without any roles.
#[must_use]
pub fn buyer(email: &str) -> Identity {
    Identity::new(Email::parse(email).unwrap(), Permissions::none())
}

/// A cart for a signed-in buyer.
#[must_use]
pub fn cart(lines: &[(&str, i32)]) -> PlaceOrderRequest {
    PlaceOrderRequest {
        user: None,
        note: String::new(),
        address: "1 Orchard Lane".to_string(),
        payment_type: "cash".to_string(),
        cancel_if_missing: false,
        ordered_products: lines
            .iter()
            .map(|(codename, quantity)| OrderedProductRequest {
                product: ProductRef {
                    codename: (*codename).to_string(),
                },
                quantity: *quantity,
            })
            .collect(),
    }
}

/// A cart for guest checkout under `email`.
#[must_use]
pub fn guest_cart(email: &str, lines: &[(&str, i32)]) -> PlaceOrderRequest {
    PlaceOrderRequest {
        user: Some(BuyerRequest {
            email: Some(email.to_string()),
            temporary: true,
        }),
        ..cart(lines)
    }
}

/// Send one request through `app` and decode the JSON response.
///
/// Bodies that are not JSON decode to `Value::Null`.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    identity: Option<&Identity>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let mut request = builder
        .body(body.map_or_else(Body::empty, |json| Body::from(json.to_string())))
        .unwrap();
    if let Some(identity) = identity {
        request.extensions_mut().insert(identity.clone());
    }

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
