//! Order engine errors.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::buyers::BuyerError;

/// Errors raised by the order fulfillment engine.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is incomplete or malformed.
    #[error("{0}")]
    Validation(String),

    /// One or more cart lines cannot be supplied, keyed by codename.
    #[error("some products are unavailable")]
    Unavailable(BTreeMap<String, String>),

    /// No order matches the codename (or it belongs to someone else).
    #[error("order not found")]
    OrderNotFound,

    /// No shop-order matches the ID.
    #[error("shop order not found")]
    ShopOrderNotFound,

    /// An email given for assignment does not belong to a courier.
    #[error("no courier is registered with email {0}")]
    UnknownUser(String),

    /// The caller may not perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// The requested status change is not allowed from the current state.
    #[error("{0}")]
    InvalidTransition(String),

    /// Guest buyer validation failed.
    #[error(transparent)]
    Buyer(#[from] BuyerError),

    /// Storage failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
