//! Core types for harvest.
//!
//! This module provides type-safe wrappers for the marketplace domain.

pub mod codename;
pub mod email;
pub mod id;
pub mod money;
pub mod permission;
pub mod status;

pub use codename::{Codename, CodenameError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use permission::{Permissions, Role};
pub use status::*;
