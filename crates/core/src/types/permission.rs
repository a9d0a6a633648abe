//! Staff roles and the permission set carried by an identity.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A role a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and changes every order.
    Admin,
    /// Delivers orders and collects shop-orders assigned to them.
    Courier,
    /// Owns a shop and handles its shop-orders.
    Farmer,
}

impl Role {
    /// Every role, in storage order.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Courier, Self::Farmer];

    const fn bit(self) -> u8 {
        match self {
            Self::Admin => 0b001,
            Self::Courier => 0b010,
            Self::Farmer => 0b100,
        }
    }

    /// Lowercase name used in storage and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Courier => "courier",
            Self::Farmer => "farmer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "courier" => Ok(Self::Courier),
            "farmer" => Ok(Self::Farmer),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// A set of [`Role`]s.
///
/// Stored as a `TEXT[]` of role names and serialized as a JSON list.
///
/// ```
/// use harvest_core::{Permissions, Role};
///
/// let perms = Permissions::from_names(["courier", "admin"]).unwrap();
/// assert!(perms.contains(Role::Admin));
/// assert!(!perms.contains(Role::Farmer));
/// assert_eq!(perms.names(), vec!["admin".to_owned(), "courier".to_owned()]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Permissions(u8);

impl Permissions {
    /// No roles at all, as held by buyers.
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// Set holding exactly one role.
    #[must_use]
    pub const fn only(role: Role) -> Self {
        Self(role.bit())
    }

    /// Parse a list of role names.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unknown role.
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::none(), |perms, name| {
            Ok(perms.with(name.as_ref().parse::<Role>()?))
        })
    }

    /// Whether the set holds `role`.
    #[must_use]
    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Copy of the set with `role` added.
    #[must_use]
    pub const fn with(self, role: Role) -> Self {
        Self(self.0 | role.bit())
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Roles held, in [`Role::ALL`] order.
    pub fn roles(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |role| self.contains(*role))
    }

    /// Role names held, in [`Role::ALL`] order.
    #[must_use]
    pub fn names(self) -> Vec<String> {
        self.roles().map(|role| role.as_str().to_owned()).collect()
    }
}

impl FromIterator<Role> for Permissions {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

impl TryFrom<Vec<String>> for Permissions {
    type Error = String;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_names(value)
    }
}

impl From<Permissions> for Vec<String> {
    fn from(perms: Permissions) -> Self {
        perms.names()
    }
}
