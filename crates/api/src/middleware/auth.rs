//! Identity extractors.
//!
//! The identity is placed in request extensions by
//! [`identity_from_session`](super::identity_from_session). These extractors
//! read it back and enforce roles before a handler runs.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn list_couriers(
//!     RequireAdmin(admin): RequireAdmin,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Vec<User>>, AppError> {
//!     Ok(Json(state.orders().couriers().await?))
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use harvest_core::Role;

use crate::error::AppError;
use crate::models::Identity;

/// The caller's identity, if signed in.
pub struct OptionalIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}

/// Extractor that requires a signed-in caller.
pub struct RequireIdentity(pub Identity);

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        signed_in(parts).map(Self)
    }
}

/// Extractor that requires the admin role.
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        with_role(parts, Role::Admin).map(Self)
    }
}

/// Extractor that requires the courier role.
pub struct RequireCourier(pub Identity);

impl<S> FromRequestParts<S> for RequireCourier
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        with_role(parts, Role::Courier).map(Self)
    }
}

fn signed_in(parts: &Parts) -> Result<Identity, AppError> {
    parts
        .extensions
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
}

fn with_role(parts: &Parts, role: Role) -> Result<Identity, AppError> {
    let identity = signed_in(parts)?;
    if !identity.has(role) {
        return Err(AppError::Forbidden(format!("{role} role required")));
    }
    Ok(identity)
}
