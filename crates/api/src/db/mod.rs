//! Persistence for the marketplace.
//!
//! # Schema: `market`
//!
//! - `users` - buyers (including temporary guests) and staff with their roles
//! - `shops` - one per farmer
//! - `products` - stock and current price
//! - `orders`, `shop_orders`, `ordered_products` - the order aggregate
//!
//! Sessions live in `tower_sessions.session`, managed by `tower-sessions-sqlx-store`.
//!
//! # Stores
//!
//! The engine only talks to the [`MarketStore`] traits. [`PgStore`] backs them
//! with `PostgreSQL`; [`MemoryStore`] keeps everything behind one mutex for
//! tests and local experiments.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p harvest-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use harvest_core::{Codename, Email, Role, UserId};

use crate::models::{
    Effects, NewOrder, OrderAggregate, OrderFilter, OrderLookup, Product, Shop,
    ShopOrderFilter, ShopOrderListing, User,
};
use crate::services::orders::OrderError;

pub mod memory;
pub mod orders;
pub mod products;
pub mod users;

pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A conditional stock decrement found too few units.
    #[error("product {product} only has {available} available units")]
    OutOfStock {
        /// Codename of the product that ran short.
        product: Codename,
        /// Units left at the time of the attempt.
        available: i32,
    },
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2.min(max_connections))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// A state transition run against a locked order aggregate.
///
/// The closure edits the aggregate in place and reports the side effects to
/// apply. Returning an error aborts the whole mutation.
pub type OrderMutation = Box<dyn FnOnce(&mut OrderAggregate) -> Result<Effects, OrderError> + Send>;

/// Product lookups for cart validation.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Products whose codename is in `codenames`, in no particular order.
    async fn products_by_codename(
        &self,
        codenames: &[Codename],
    ) -> Result<Vec<Product>, RepositoryError>;
}

/// User and shop lookups.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// User registered under `email`.
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Shop owned by `owner`.
    async fn shop_owned_by(&self, owner: UserId) -> Result<Option<Shop>, RepositoryError>;

    /// Every user holding `role`, ordered by email.
    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, RepositoryError>;
}

/// Order aggregate persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write a new order in one atomic unit.
    ///
    /// Creates the temporary buyer if requested, decrements stock for every
    /// line with a conditional update, and inserts the order, shop-orders and
    /// lines. Nothing is written if any step fails.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::OutOfStock` if any line exceeds remaining stock
    /// - `RepositoryError::Conflict` if the temporary buyer's email is taken
    /// - `RepositoryError::Database` for other database errors
    async fn insert_order(&self, order: NewOrder) -> Result<OrderAggregate, RepositoryError>;

    /// Lock an order aggregate, apply `mutation`, and persist the result.
    ///
    /// # Errors
    ///
    /// - `OrderError::OrderNotFound` / `OrderError::ShopOrderNotFound` if the
    ///   lookup matches nothing
    /// - whatever `mutation` returns, with nothing written
    /// - `OrderError::Repository` for database errors
    async fn mutate_order(
        &self,
        lookup: &OrderLookup,
        mutation: OrderMutation,
    ) -> Result<OrderAggregate, OrderError>;

    /// Orders matching `filter`, newest first.
    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderAggregate>, RepositoryError>;

    /// Shop-orders matching `filter`, by parent pickup date then placement.
    async fn list_shop_orders(
        &self,
        filter: &ShopOrderFilter,
    ) -> Result<Vec<ShopOrderListing>, RepositoryError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Everything the order fulfillment engine needs from storage.
pub trait MarketStore: InventoryStore + UserStore + OrderStore {}

impl<T> MarketStore for T where T: InventoryStore + UserStore + OrderStore {}

/// `PostgreSQL`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
