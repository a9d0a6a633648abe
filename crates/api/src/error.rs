//! Unified error handling for the API.
//!
//! Every error leaves the service as `{ "message": ..., "payload"?: ... }`.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::buyers::BuyerError;
use crate::services::orders::OrderError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order engine rejected the request.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => match err {
                OrderError::Validation(_)
                | OrderError::Unavailable(_)
                | OrderError::UnknownUser(_)
                | OrderError::Buyer(BuyerError::InvalidEmail(_)) => StatusCode::BAD_REQUEST,
                OrderError::OrderNotFound | OrderError::ShopOrderNotFound => StatusCode::NOT_FOUND,
                OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
                OrderError::InvalidTransition(_) | OrderError::Buyer(BuyerError::EmailTaken) => {
                    StatusCode::CONFLICT
                }
                OrderError::Buyer(BuyerError::Repository(_)) | OrderError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn payload(&self) -> Option<serde_json::Value> {
        match self {
            Self::Order(OrderError::Unavailable(lines)) => serde_json::to_value(lines).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            message,
            payload: self.payload(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON request body whose rejections render as [`AppError`].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::db::RepositoryError;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unavailable_renders_payload() {
        let lines = BTreeMap::from([(
            "widget".to_string(),
            "product only has 3 available units".to_string(),
        )]);
        let (status, body) = body_json(OrderError::Unavailable(lines).into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "some products are unavailable");
        assert_eq!(body["payload"]["widget"], "product only has 3 available units");
    }

    #[tokio::test]
    async fn test_internal_errors_are_generic() {
        let err = AppError::from(OrderError::Repository(RepositoryError::DataCorruption(
            "bad row".to_string(),
        )));
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal server error");
        assert!(body.get("payload").is_none());
    }

    #[test]
    fn test_status_codes() {
        let status = |err: AppError| err.status();

        assert_eq!(
            status(OrderError::OrderNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(OrderError::Forbidden("no".to_string()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(OrderError::InvalidTransition("no".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(OrderError::Buyer(BuyerError::EmailTaken).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(OrderError::UnknownUser("x@example.com".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AppError::Unauthorized("sign in".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AppError::Forbidden("admins only".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(AppError::BadRequest("bad body".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
