//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Store reachability
//!
//! # Orders
//! POST /orders                      - Place an order (guest or signed in)
//! GET  /orders                      - Caller's orders, or all for admins
//! PUT  /orders/{codename}           - Status, courier, pickup date (admin, courier)
//! PUT  /orders/{codename}/cancel    - Buyer cancellation
//!
//! # Shops
//! GET  /shop/orders                 - Shop-orders of the caller's shop
//! PUT  /shop/orders/{id}            - Status, note, collector
//!
//! # Couriers
//! GET  /couriers                    - Assignable couriers (admin)
//! GET  /courier/deliveries          - Orders being delivered by the caller
//! GET  /courier/pickups             - Shop-orders to collect from today on
//! ```

pub mod couriers;
pub mod orders;
pub mod shop_orders;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, put},
};

use crate::middleware::identity_from_session;
use crate::state::AppState;

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Orders
        .route("/orders", get(orders::index).post(orders::place))
        .route("/orders/{codename}", put(orders::change))
        .route("/orders/{codename}/cancel", put(orders::cancel))
        // Shops
        .route("/shop/orders", get(shop_orders::index))
        .route("/shop/orders/{id}", put(shop_orders::edit))
        // Couriers
        .route("/couriers", get(couriers::index))
        .route("/courier/deliveries", get(couriers::deliveries))
        .route("/courier/pickups", get(couriers::pickups))
}

/// The application without transport layers.
///
/// Sessions, CORS, tracing and Sentry are added by the binary. Tests drive
/// this router directly and place an [`Identity`](crate::models::Identity) in
/// the request extensions themselves.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .layer(from_fn(identity_from_session))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::db::MemoryStore;

    fn test_app() -> Router {
        app(AppState::new(Arc::new(MemoryStore::new())))
    }

    async fn status_of(uri: &str) -> StatusCode {
        test_app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        assert_eq!(status_of("/health").await, StatusCode::OK);
        assert_eq!(status_of("/health/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        assert_eq!(status_of("/products").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_anonymous_listing_is_unauthorized() {
        assert_eq!(status_of("/courier/pickups").await, StatusCode::UNAUTHORIZED);
    }
}
