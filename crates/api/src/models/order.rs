//! Order domain types.
//!
//! An [`Order`] spans every shop in the buyer's cart. Each shop gets its own
//! [`ShopOrder`], and each cart line becomes an [`OrderedProduct`] pointing at
//! both.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use harvest_core::{
    Codename, Email, Money, OrderId, OrderStatus, OrderedProductId, ProductId, ShopId,
    ShopOrderId, ShopOrderStatus, UserId,
};

use super::user::NewUser;

/// A checkout order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Short public identifier.
    pub codename: Codename,
    /// Buyer email.
    pub email: Email,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Buyer note.
    pub note: String,
    /// Delivery address.
    pub address: String,
    /// How the buyer pays on delivery.
    pub payment_type: String,
    /// Sum of line values, less cancelled shop-orders.
    pub total_price: Money,
    /// Cancel the whole order if any shop drops out.
    pub cancel_if_missing: bool,
    /// Day the courier collects from the shops.
    pub pickup_date: Option<NaiveDate>,
    /// Courier delivering the order.
    pub deliverer: Option<UserId>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// One shop's slice of an [`Order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopOrder {
    /// Unique shop-order ID.
    pub id: ShopOrderId,
    /// Parent order.
    pub order_id: OrderId,
    /// Shop supplying the lines.
    pub shop_id: ShopId,
    /// Shop display name.
    pub shop_name: String,
    /// Lifecycle status.
    pub status: ShopOrderStatus,
    /// Shop-facing note.
    pub message: String,
    /// Courier collecting from the shop.
    pub collector: Option<UserId>,
}

/// A line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProduct {
    /// Unique line ID.
    pub id: OrderedProductId,
    /// Parent order.
    pub order_id: OrderId,
    /// Shop-order the line belongs to.
    pub shop_order_id: ShopOrderId,
    /// Ordered product.
    pub product_id: ProductId,
    /// Product slug.
    pub product_codename: Codename,
    /// Product display name.
    pub product_name: String,
    /// Units ordered.
    pub quantity: i32,
    /// Product price when the order was placed.
    pub unit_price: Decimal,
}

/// An order with all of its shop-orders and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAggregate {
    /// The order row.
    #[serde(flatten)]
    pub order: Order,
    /// One entry per shop.
    pub shop_orders: Vec<ShopOrder>,
    /// Every line across all shops.
    pub ordered_products: Vec<OrderedProduct>,
}

impl OrderAggregate {
    /// Shop-order by ID.
    #[must_use]
    pub fn shop_order(&self, id: ShopOrderId) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.id == id)
    }

    /// Mutable shop-order by ID.
    pub fn shop_order_mut(&mut self, id: ShopOrderId) -> Option<&mut ShopOrder> {
        self.shop_orders.iter_mut().find(|so| so.id == id)
    }

    /// Lines belonging to one shop-order.
    pub fn lines_of(&self, id: ShopOrderId) -> impl Iterator<Item = &OrderedProduct> {
        self.ordered_products
            .iter()
            .filter(move |line| line.shop_order_id == id)
    }
}

/// A shop-order together with its parent order and its own lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopOrderListing {
    /// The shop-order row.
    #[serde(flatten)]
    pub shop_order: ShopOrder,
    /// Parent order, without siblings.
    pub order: Order,
    /// Lines supplied by this shop.
    pub ordered_products: Vec<OrderedProduct>,
}

// =============================================================================
// Inputs
// =============================================================================

/// A validated order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Short public identifier.
    pub codename: Codename,
    /// Buyer email.
    pub email: Email,
    /// Guest identity to create alongside the order.
    pub temporary_buyer: Option<NewUser>,
    /// Buyer note.
    pub note: String,
    /// Delivery address.
    pub address: String,
    /// Payment type.
    pub payment_type: String,
    /// Total at placement.
    pub total_price: Money,
    /// Cancel the whole order if any shop drops out.
    pub cancel_if_missing: bool,
    /// One entry per shop in the cart.
    pub shop_orders: Vec<NewShopOrder>,
}

/// A shop's slice of a [`NewOrder`].
#[derive(Debug, Clone)]
pub struct NewShopOrder {
    /// Supplying shop.
    pub shop_id: ShopId,
    /// Lines from that shop.
    pub lines: Vec<NewOrderLine>,
}

/// A validated cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    /// Resolved product.
    pub product_id: ProductId,
    /// Slug the buyer asked for.
    pub codename: Codename,
    /// Units requested.
    pub quantity: i32,
    /// Price captured during validation.
    pub unit_price: Decimal,
}

/// How to find the order a mutation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    /// By the order's public codename.
    Codename(Codename),
    /// By one of its shop-orders.
    ShopOrder(ShopOrderId),
}

/// Side effects a state transition asks the store to perform in the same
/// transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// Delete the temporary user with this email, if one exists.
    pub delete_temporary_buyer: Option<Email>,
}

/// Predicates for listing orders. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Buyer email.
    pub email: Option<Email>,
    /// Assigned courier.
    pub deliverer: Option<UserId>,
    /// Allowed statuses.
    pub statuses: Option<Vec<OrderStatus>>,
}

impl OrderFilter {
    /// Whether `order` satisfies every set predicate.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.email.as_ref().is_none_or(|email| &order.email == email)
            && self
                .deliverer
                .is_none_or(|courier| order.deliverer == Some(courier))
            && self
                .statuses
                .as_ref()
                .is_none_or(|statuses| statuses.contains(&order.status))
    }
}

/// Predicates for listing shop-orders. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ShopOrderFilter {
    /// Supplying shop.
    pub shop: Option<ShopId>,
    /// Assigned collector.
    pub collector: Option<UserId>,
    /// Allowed statuses.
    pub statuses: Option<Vec<ShopOrderStatus>>,
    /// Earliest parent pickup date; orders without one are excluded.
    pub pickup_from: Option<NaiveDate>,
}

impl ShopOrderFilter {
    /// Whether `shop_order` under `order` satisfies every set predicate.
    #[must_use]
    pub fn matches(&self, shop_order: &ShopOrder, order: &Order) -> bool {
        self.shop.is_none_or(|shop| shop_order.shop_id == shop)
            && self
                .collector
                .is_none_or(|courier| shop_order.collector == Some(courier))
            && self
                .statuses
                .as_ref()
                .is_none_or(|statuses| statuses.contains(&shop_order.status))
            && self
                .pickup_from
                .is_none_or(|from| order.pickup_date.is_some_and(|date| date >= from))
    }
}
