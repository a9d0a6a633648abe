//! User and shop queries.

use async_trait::async_trait;
use uuid::Uuid;

use harvest_core::{Codename, Email, Permissions, Role, ShopId, UserId};

use super::{PgStore, RepositoryError, UserStore, conflict_on_unique};
use crate::models::{NewUser, Shop, User};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    permissions: Vec<String>,
    temporary: bool,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let permissions = Permissions::from_names(&row.permissions).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid permissions in database: {e}"))
        })?;
        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            permissions,
            temporary: row.temporary,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    codename: String,
}

impl TryFrom<ShopRow> for Shop {
    type Error = RepositoryError;

    fn try_from(row: ShopRow) -> Result<Self, Self::Error> {
        let codename = Codename::parse(&row.codename).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shop codename in database: {e}"))
        })?;
        Ok(Self {
            id: ShopId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            name: row.name,
            codename,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, permissions, temporary
            FROM market.users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn shop_owned_by(&self, owner: UserId) -> Result<Option<Shop>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopRow>(
            r"
            SELECT id, owner_id, name, codename
            FROM market.shops
            WHERE owner_id = $1
            ",
        )
        .bind(owner)
        .fetch_optional(self.pool())
        .await?;

        row.map(Shop::try_from).transpose()
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, permissions, temporary
            FROM market.users
            WHERE $1 = ANY(permissions)
            ORDER BY email
            ",
        )
        .bind(role.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }
}

impl PgStore {
    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO market.users (id, email, name, permissions, temporary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, name, permissions, temporary
            ",
        )
        .bind(UserId::generate())
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(user.permissions.names())
        .bind(user.temporary)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        User::try_from(row)
    }

    /// Create a shop for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a shop or
    /// the codename is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_shop(&self, owner: UserId, name: &str) -> Result<Shop, RepositoryError> {
        let row = sqlx::query_as::<_, ShopRow>(
            r"
            INSERT INTO market.shops (id, owner_id, name, codename)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, name, codename
            ",
        )
        .bind(ShopId::generate())
        .bind(owner)
        .bind(name)
        .bind(Codename::slugify(name).as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "shop"))?;

        Shop::try_from(row)
    }
}
