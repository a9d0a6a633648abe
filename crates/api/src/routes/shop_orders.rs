//! Shop-order route handlers for farmers and staff.

use axum::{
    Json,
    extract::{Path, State},
};

use harvest_core::ShopOrderId;

use crate::error::{AppError, JsonBody};
use crate::middleware::RequireIdentity;
use crate::models::{OrderAggregate, ShopOrderListing};
use crate::services::orders::{EditShopOrderRequest, OrderError};
use crate::state::AppState;

/// `GET /shop/orders`
pub async fn index(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<Vec<ShopOrderListing>>, AppError> {
    Ok(Json(state.orders().shop_orders_for(&identity).await?))
}

/// `PUT /shop/orders/{id}`
pub async fn edit(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<EditShopOrderRequest>,
) -> Result<Json<OrderAggregate>, AppError> {
    let id: ShopOrderId = id.parse().map_err(|_| OrderError::ShopOrderNotFound)?;
    let order = state
        .orders()
        .edit_shop_order(&identity, id, request)
        .await?;
    Ok(Json(order))
}
