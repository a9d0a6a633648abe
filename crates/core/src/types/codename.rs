//! URL-safe slug identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing a [`Codename`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodenameError {
    /// The input string is empty.
    #[error("codename cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("codename must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("codename may only contain lowercase letters, digits and dashes")]
    InvalidCharacter,
}

/// A human-readable identifier used in URLs instead of a primary key.
///
/// Products are addressed by a slug derived from their name
/// (`"heirloom-tomatoes"`), orders by a short random hex string.
///
/// ```
/// use harvest_core::Codename;
///
/// assert_eq!(Codename::slugify("Heirloom Tomatoes!").as_str(), "heirloom-tomatoes");
/// assert_eq!(Codename::order_identifier().as_str().len(), 8);
/// assert!(Codename::parse("Not A Slug").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Codename(String);

impl Codename {
    /// Maximum length of a codename.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a codename that is already in slug form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than
    /// [`Self::MAX_LENGTH`], or contains anything other than `[a-z0-9-]`.
    pub fn parse(s: &str) -> Result<Self, CodenameError> {
        if s.is_empty() {
            return Err(CodenameError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(CodenameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(CodenameError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name.
    ///
    /// Runs of non-alphanumeric characters collapse into one dash; leading and
    /// trailing dashes are dropped. A name with no usable characters yields a
    /// random order-style identifier instead of an empty slug.
    #[must_use]
    pub fn slugify(name: &str) -> Self {
        let mut slug = String::with_capacity(name.len());
        for ch in name.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        slug.truncate(Self::MAX_LENGTH);
        if slug.is_empty() {
            return Self::order_identifier();
        }
        Self(slug)
    }

    /// A fresh order identifier: the first 8 hex characters of a random UUID.
    #[must_use]
    pub fn order_identifier() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    /// Returns the codename as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Codename {
    type Err = CodenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Codename {
    type Error = CodenameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Codename> for String {
    fn from(codename: Codename) -> Self {
        codename.0
    }
}

impl AsRef<str> for Codename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(Codename::parse("widget-1").is_ok());
        assert_eq!(Codename::parse(""), Err(CodenameError::Empty));
        assert_eq!(
            Codename::parse("Widget"),
            Err(CodenameError::InvalidCharacter)
        );
        assert_eq!(
            Codename::parse("a b"),
            Err(CodenameError::InvalidCharacter)
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Codename::slugify("Sweet Corn").as_str(), "sweet-corn");
        assert_eq!(Codename::slugify("  --Kale, Lacinato--  ").as_str(), "kale-lacinato");
        assert_eq!(Codename::slugify("Eggs (12)").as_str(), "eggs-12");
    }

    #[test]
    fn test_slugify_unusable_name() {
        let slug = Codename::slugify("!!!");
        assert_eq!(slug.as_str().len(), 8);
    }

    #[test]
    fn test_order_identifier_is_hex() {
        let id = Codename::order_identifier();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(Codename::parse(id.as_str()).is_ok());
    }
}
