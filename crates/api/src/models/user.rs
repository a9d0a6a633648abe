//! User and shop domain types.

use serde::Serialize;

use harvest_core::{Codename, Email, Permissions, ShopId, UserId};

/// A marketplace user.
///
/// Temporary users carry a guest buyer's email through checkout and are
/// removed once their order completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login and contact email.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Roles held.
    pub permissions: Permissions,
    /// Guest checkout identity with no credentials.
    pub temporary: bool,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login and contact email.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Roles granted.
    pub permissions: Permissions,
    /// Guest checkout identity.
    pub temporary: bool,
}

impl NewUser {
    /// A guest buyer identity for `email`.
    #[must_use]
    pub fn temporary(email: Email) -> Self {
        Self {
            email,
            name: String::new(),
            permissions: Permissions::none(),
            temporary: true,
        }
    }
}

/// A shop owned by a farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    /// Unique shop ID.
    pub id: ShopId,
    /// Owning user.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub codename: Codename,
}
