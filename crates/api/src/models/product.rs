//! Product domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use harvest_core::{Codename, ProductId, ShopId};

/// A product listed by a shop.
///
/// `quantity` is the stock on hand. It only ever goes down, and only through
/// order placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Shop that sells the product.
    pub shop_id: ShopId,
    /// URL slug used by carts.
    pub codename: Codename,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Decimal,
    /// Units in stock.
    pub quantity: i32,
    /// Whether buyers may order it.
    pub public: bool,
}
