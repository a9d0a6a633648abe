//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! harvest-cli user create -e admin@example.com -n "Ada Admin" -r admin
//! harvest-cli user create -e sam@example.com -n "Sam" -r courier,farmer
//! ```

use harvest_api::db::PgStore;
use harvest_api::models::{NewUser, User};
use harvest_core::{Email, Permissions};

use super::{CommandError, connect};

/// Parse a comma separated role list. Blank entries are ignored.
///
/// # Errors
///
/// Returns `CommandError::InvalidRole` naming the first unknown role.
pub fn parse_roles(roles: &str) -> Result<Permissions, CommandError> {
    Permissions::from_names(
        roles
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty()),
    )
    .map_err(CommandError::InvalidRole)
}

/// Create a new user.
///
/// # Arguments
///
/// * `email` - User's email address
/// * `name` - User's display name
/// * `roles` - Comma separated roles
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken, or the
/// database fails.
pub async fn create(email: &str, name: &str, roles: &str) -> Result<User, CommandError> {
    let permissions = parse_roles(roles)?;
    let email = Email::parse(email)?;

    let store = PgStore::new(connect().await?);

    tracing::info!(%email, roles = ?permissions.names(), "Creating user");
    let user = store
        .create_user(&NewUser {
            email,
            name: name.to_owned(),
            permissions,
            temporary: false,
        })
        .await?;

    tracing::info!(id = %user.id, email = %user.email, "User created successfully");
    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use harvest_core::Role;

    use super::*;

    #[test]
    fn test_parse_roles() {
        let perms = parse_roles("courier, admin").unwrap();
        assert!(perms.contains(Role::Courier));
        assert!(perms.contains(Role::Admin));
        assert!(!perms.contains(Role::Farmer));

        assert!(parse_roles("").unwrap().is_empty());
        assert!(matches!(
            parse_roles("courier,chef"),
            Err(CommandError::InvalidRole(_))
        ));
    }
}
