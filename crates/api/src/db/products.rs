//! Product queries.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use harvest_core::{Codename, ProductId, ShopId};

use super::{InventoryStore, PgStore, RepositoryError, conflict_on_unique};
use crate::models::Product;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    shop_id: Uuid,
    codename: String,
    name: String,
    price: Decimal,
    quantity: i32,
    public: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let codename = Codename::parse(&row.codename).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product codename in database: {e}"))
        })?;
        Ok(Self {
            id: ProductId::new(row.id),
            shop_id: ShopId::new(row.shop_id),
            codename,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            public: row.public,
        })
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn products_by_codename(
        &self,
        codenames: &[Codename],
    ) -> Result<Vec<Product>, RepositoryError> {
        let codenames: Vec<&str> = codenames.iter().map(Codename::as_str).collect();

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, shop_id, codename, name, price, quantity, public
            FROM market.products
            WHERE codename = ANY($1)
            ",
        )
        .bind(&codenames)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }
}

impl PgStore {
    /// Add a product to a shop's catalogue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the codename is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_product(
        &self,
        shop_id: ShopId,
        name: &str,
        price: Decimal,
        quantity: i32,
    ) -> Result<Product, RepositoryError> {
        let codename = Codename::slugify(name);

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO market.products (id, shop_id, codename, name, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, shop_id, codename, name, price, quantity, public
            ",
        )
        .bind(ProductId::generate())
        .bind(shop_id)
        .bind(codename.as_str())
        .bind(name)
        .bind(price)
        .bind(quantity)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "product"))?;

        Product::try_from(row)
    }
}
