//! Courier route handlers.

use axum::{Json, extract::State};
use chrono::Utc;

use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireCourier};
use crate::models::{OrderAggregate, ShopOrderListing, User};
use crate::state::AppState;

/// `GET /couriers`
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.orders().couriers().await?))
}

/// `GET /courier/deliveries`
pub async fn deliveries(
    State(state): State<AppState>,
    RequireCourier(courier): RequireCourier,
) -> Result<Json<Vec<OrderAggregate>>, AppError> {
    Ok(Json(state.orders().deliveries_for(&courier).await?))
}

/// `GET /courier/pickups`
pub async fn pickups(
    State(state): State<AppState>,
    RequireCourier(courier): RequireCourier,
) -> Result<Json<Vec<ShopOrderListing>>, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.orders().pickups_for(&courier, today).await?))
}
