//! Business logic.
//!
//! Services sit between the HTTP handlers and the store traits. They own
//! permission checks and validation; persistence details stay in [`crate::db`].

pub mod buyers;
pub mod orders;
