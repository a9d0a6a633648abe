//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::error::{AppError, JsonBody};
use crate::middleware::{OptionalIdentity, RequireIdentity};
use crate::models::OrderAggregate;
use crate::services::orders::{ChangeOrderRequest, PlaceOrderRequest};
use crate::state::AppState;

/// `POST /orders`
pub async fn place(
    State(state): State<AppState>,
    OptionalIdentity(identity): OptionalIdentity,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderAggregate>), AppError> {
    let order = state
        .orders()
        .place_order(identity.as_ref(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders`
pub async fn index(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<Vec<OrderAggregate>>, AppError> {
    Ok(Json(state.orders().orders_for(&identity).await?))
}

/// `PUT /orders/{codename}`
pub async fn change(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(codename): Path<String>,
    JsonBody(request): JsonBody<ChangeOrderRequest>,
) -> Result<Json<OrderAggregate>, AppError> {
    let order = state
        .orders()
        .change_order(&identity, &codename, request)
        .await?;
    Ok(Json(order))
}

/// `PUT /orders/{codename}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(codename): Path<String>,
) -> Result<Json<OrderAggregate>, AppError> {
    Ok(Json(state.orders().cancel_order(&identity, &codename).await?))
}
