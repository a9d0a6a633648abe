//! Harvest Core - Shared domain types.
//!
//! This crate provides the types shared by every harvest component:
//! - `api` - Order fulfillment HTTP service
//! - `cli` - Migrations, staff accounts and demo data
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no database
//! access, no HTTP. Database encoding for identifiers is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, codenames, money, statuses and permissions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
