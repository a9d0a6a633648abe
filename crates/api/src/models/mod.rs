//! Domain models for the order fulfillment engine.
//!
//! These are validated domain objects, separate from the row types in
//! [`crate::db`]. Types that appear in responses serialize as camelCase JSON.

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::{
    Effects, NewOrder, NewOrderLine, NewShopOrder, Order, OrderAggregate, OrderFilter,
    OrderLookup, OrderedProduct, ShopOrder, ShopOrderFilter, ShopOrderListing,
};
pub use product::Product;
pub use session::{Identity, session_keys};
pub use user::{NewUser, Shop, User};
