//! Identity carried by each request.

use serde::{Deserialize, Serialize};

use harvest_core::{Email, Permissions, Role};

/// The authenticated caller.
///
/// Written into the session by the sign-in service and copied into request
/// extensions by [`crate::middleware::identity_from_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Caller's email address.
    pub email: Email,
    /// Roles held by the caller.
    pub permissions: Permissions,
}

impl Identity {
    /// Build an identity.
    #[must_use]
    pub const fn new(email: Email, permissions: Permissions) -> Self {
        Self { email, permissions }
    }

    /// Whether the caller holds `role`.
    #[must_use]
    pub const fn has(&self, role: Role) -> bool {
        self.permissions.contains(role)
    }

    /// Whether the caller is an admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.has(Role::Admin)
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current signed-in identity.
    pub const CURRENT_USER: &str = "current_user";
}
