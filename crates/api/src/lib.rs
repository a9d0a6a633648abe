//! Harvest API library.
//!
//! The order fulfillment engine and its HTTP surface, exposed as a library so
//! the binary, the CLI and the integration tests share one implementation.
//!
//! # Layout
//!
//! - [`services::orders`] - placement, status transitions and role-scoped queries
//! - [`db`] - store traits with `PostgreSQL` and in-memory implementations
//! - [`routes`] - axum handlers
//! - [`middleware`] - identity extractors, sessions, request IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
