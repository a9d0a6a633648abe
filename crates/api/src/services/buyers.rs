//! Temporary buyer lifecycle.
//!
//! Guests check out under a temporary user that only carries their email. The
//! user is created inside the placement transaction and deleted in the same
//! transaction that moves the order to `Completed`.

use thiserror::Error;

use harvest_core::{Email, EmailError};

use crate::db::{RepositoryError, UserStore};
use crate::models::NewUser;

/// Errors from guest buyer validation.
#[derive(Debug, Error)]
pub enum BuyerError {
    /// The email is not a valid address.
    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A user with this email already exists.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// Storage failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Validate a guest's email and prepare their temporary identity.
///
/// # Errors
///
/// - `BuyerError::InvalidEmail` if `raw_email` is not an address
/// - `BuyerError::EmailTaken` if any user, temporary or not, already uses it
/// - `BuyerError::Repository` if the lookup fails
pub async fn prepare_temporary_buyer(
    users: &dyn UserStore,
    raw_email: &str,
) -> Result<NewUser, BuyerError> {
    let email = Email::parse(raw_email)?;
    if users.user_by_email(&email).await?.is_some() {
        return Err(BuyerError::EmailTaken);
    }
    Ok(NewUser::temporary(email))
}

/// Map a failed placement insert back to the buyer error it stands for.
///
/// Two guests racing on one email both pass [`prepare_temporary_buyer`]; the
/// unique index turns the loser's insert into a `Conflict`.
#[must_use]
pub fn conflict_as_taken(err: RepositoryError) -> BuyerError {
    match err {
        RepositoryError::Conflict(what) if what.starts_with("email") => BuyerError::EmailTaken,
        other => BuyerError::Repository(other),
    }
}
