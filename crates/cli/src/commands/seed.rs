//! Seed the database with a small demo marketplace.
//!
//! Creates an admin, a courier, a farmer with one shop and a few products.
//! Rows that already exist are left alone, so the command can be re-run.

use rust_decimal::Decimal;

use harvest_api::db::{PgStore, RepositoryError, UserStore};
use harvest_api::models::{NewUser, User};
use harvest_core::{Email, Permissions, Role};

use super::{CommandError, connect};

/// Demo products as (name, price in cents, stock).
const PRODUCTS: [(&str, i64, i32); 4] = [
    ("Curly Kale", 350, 40),
    ("Free-range Eggs", 600, 24),
    ("Wildflower Honey", 975, 12),
    ("Heirloom Tomatoes", 420, 30),
];

/// Load the demo data.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails for a
/// reason other than the row already existing.
pub async fn run() -> Result<(), CommandError> {
    let store = PgStore::new(connect().await?);

    ensure_user(&store, "admin@harvest.test", "Ada Admin", Role::Admin).await?;
    ensure_user(&store, "courier@harvest.test", "Sam Courier", Role::Courier).await?;
    let farmer = ensure_user(&store, "farmer@harvest.test", "Fern Farmer", Role::Farmer).await?;

    let shop = match store.shop_owned_by(farmer.id).await? {
        Some(shop) => shop,
        None => store.create_shop(farmer.id, "Green Acres Farm").await?,
    };
    tracing::info!(shop = %shop.codename, "Shop ready");

    for (name, cents, quantity) in PRODUCTS {
        match store
            .create_product(shop.id, name, Decimal::new(cents, 2), quantity)
            .await
        {
            Ok(product) => tracing::info!(product = %product.codename, "Product created"),
            Err(RepositoryError::Conflict(_)) => tracing::info!(%name, "Product exists, skipping"),
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("Seed complete!");
    Ok(())
}

async fn ensure_user(
    store: &PgStore,
    email: &str,
    name: &str,
    role: Role,
) -> Result<User, CommandError> {
    let email = Email::parse(email)?;
    if let Some(user) = store.user_by_email(&email).await? {
        tracing::info!(%email, "User exists, skipping");
        return Ok(user);
    }

    let user = store
        .create_user(&NewUser {
            email,
            name: name.to_owned(),
            permissions: Permissions::only(role),
            temporary: false,
        })
        .await?;
    tracing::info!(email = %user.email, %role, "User created");
    Ok(user)
}
