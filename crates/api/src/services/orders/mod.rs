//! Order fulfillment engine.
//!
//! [`OrderService`] is the entry point for every order operation. It checks
//! the caller's permissions, validates input against the store, and hands the
//! actual state transitions to the pure functions in [`lifecycle`] so they run
//! inside the store's locked mutation.
//!
//! # Modules
//!
//! - [`inventory`] - cart validation against stock
//! - [`pricing`] - order totals and cancellation adjustments
//! - [`lifecycle`] - order and shop-order state machine
//! - [`queries`] - role-scoped listing filters

mod error;
pub mod inventory;
pub mod lifecycle;
pub mod pricing;
pub mod queries;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

use harvest_core::{Codename, Email, OrderStatus, Role, ShopId, ShopOrderId, ShopOrderStatus, UserId};

pub use error::OrderError;

use crate::db::{MarketStore, RepositoryError};
use crate::models::{
    Identity, NewOrder, OrderAggregate, OrderLookup, Shop, ShopOrderListing, User,
};
use crate::services::buyers;

use inventory::CartLine;
use lifecycle::{OrderChange, ShopOrderEdit};

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /orders`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Buyer details; only read for guest checkout.
    #[serde(default)]
    pub user: Option<BuyerRequest>,
    /// Free-form note for the shops.
    #[serde(default)]
    pub note: String,
    /// Delivery address.
    #[serde(default)]
    pub address: String,
    /// How the buyer pays.
    #[serde(default)]
    pub payment_type: String,
    /// Cancel the whole order if any shop drops out.
    #[serde(default)]
    pub cancel_if_missing: bool,
    /// Cart lines.
    #[serde(default)]
    pub ordered_products: Vec<OrderedProductRequest>,
}

/// Buyer block of a [`PlaceOrderRequest`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuyerRequest {
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Check out as a guest.
    #[serde(default)]
    pub temporary: bool,
}

/// One cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderedProductRequest {
    /// Product reference.
    pub product: ProductRef,
    /// Units requested.
    pub quantity: i32,
}

/// Product referenced by codename.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRef {
    /// Product slug.
    pub codename: String,
}

/// Body of `PUT /orders/{codename}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOrderRequest {
    /// New status code.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Courier email to assign.
    #[serde(default)]
    pub deliverer: Option<String>,
    /// Pickup day as `YYYY-MM-DD`.
    #[serde(default)]
    pub pickup_date: Option<String>,
}

/// Body of `PUT /shop/orders/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditShopOrderRequest {
    /// New status code.
    #[serde(default)]
    pub status: Option<ShopOrderStatus>,
    /// Shop-facing note.
    #[serde(default)]
    pub message: Option<String>,
    /// Courier email to assign for pickup.
    #[serde(default)]
    pub collector: Option<String>,
}

/// Which shop-orders a caller may edit.
#[derive(Debug, Clone, Copy)]
enum ShopOrderScope {
    Any,
    Shop(ShopId),
}

// =============================================================================
// Service
// =============================================================================

/// Order operations over an injected store.
pub struct OrderService<'a> {
    store: &'a dyn MarketStore,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a dyn MarketStore) -> Self {
        Self { store }
    }

    /// Validate a cart and place the order.
    ///
    /// A signed-in caller orders under their own email. Anyone else must ask
    /// for guest checkout, and a temporary buyer is created with the order.
    ///
    /// # Errors
    ///
    /// - `OrderError::Validation` for missing fields or an empty cart
    /// - `OrderError::Unavailable` with one message per failing line
    /// - `OrderError::Buyer` if the guest email is invalid or taken
    /// - `OrderError::Repository` if the store fails; nothing is written
    #[tracing::instrument(
        skip_all,
        fields(lines = request.ordered_products.len(), guest = caller.is_none())
    )]
    pub async fn place_order(
        &self,
        caller: Option<&Identity>,
        request: PlaceOrderRequest,
    ) -> Result<OrderAggregate, OrderError> {
        let address = required(request.address, "address")?;
        let payment_type = required(request.payment_type, "paymentType")?;
        if request.ordered_products.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one product".to_string(),
            ));
        }

        let cart = inventory::merge_lines(
            request
                .ordered_products
                .into_iter()
                .map(|line| CartLine {
                    codename: line.product.codename,
                    quantity: line.quantity,
                })
                .collect(),
        );
        let products = self
            .store
            .products_by_codename(&inventory::lookup_codenames(&cart.lines))
            .await?;
        let resolved = cart.check(&products).map_err(|errors| {
            tracing::warn!(?errors, "Rejected cart");
            OrderError::Unavailable(errors)
        })?;

        let (email, temporary_buyer) = match caller {
            Some(identity) => (identity.email.clone(), None),
            None => {
                let buyer = request.user.unwrap_or_default();
                if !buyer.temporary {
                    return Err(OrderError::Validation(
                        "sign in or check out as a guest".to_string(),
                    ));
                }
                let raw = buyer.email.unwrap_or_default();
                let buyer = buyers::prepare_temporary_buyer(self.store, &raw).await?;
                (buyer.email.clone(), Some(buyer))
            }
        };
        let is_guest = temporary_buyer.is_some();

        let shop_orders = inventory::group_by_shop(resolved);
        let order = NewOrder {
            codename: Codename::order_identifier(),
            email,
            temporary_buyer,
            note: request.note,
            address,
            payment_type,
            total_price: pricing::order_total(&shop_orders),
            cancel_if_missing: request.cancel_if_missing,
            shop_orders,
        };

        match self.store.insert_order(order).await {
            Ok(aggregate) => {
                tracing::info!(
                    order = %aggregate.order.codename,
                    total = %aggregate.order.total_price,
                    shops = aggregate.shop_orders.len(),
                    "Order placed"
                );
                Ok(aggregate)
            }
            Err(RepositoryError::OutOfStock { product, available }) => {
                tracing::warn!(%product, available, "Stock ran out during placement");
                Err(OrderError::Unavailable(BTreeMap::from([(
                    product.to_string(),
                    format!("product only has {available} available units"),
                )])))
            }
            Err(err @ RepositoryError::Conflict(_)) if is_guest => {
                Err(buyers::conflict_as_taken(err).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Privileged order edit: status, courier and pickup date.
    ///
    /// Admins may change anything. A courier may only move the status of an
    /// order assigned to them.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` for other callers
    /// - `OrderError::Validation` for a malformed pickup date
    /// - `OrderError::UnknownUser` if the deliverer is not a courier
    /// - `OrderError::OrderNotFound` / `OrderError::InvalidTransition`
    #[tracing::instrument(skip(self, identity, request), fields(caller = %identity.email))]
    pub async fn change_order(
        &self,
        identity: &Identity,
        codename: &str,
        request: ChangeOrderRequest,
    ) -> Result<OrderAggregate, OrderError> {
        let lookup = order_lookup(codename)?;
        let pickup_date = request
            .pickup_date
            .as_deref()
            .map(parse_pickup_date)
            .transpose()?;

        let (change, assigned_to) = if identity.is_admin() {
            let deliverer = match request.deliverer.as_deref() {
                Some(email) => Some(self.resolve_courier(email).await?),
                None => None,
            };
            let change = OrderChange {
                status: request.status,
                deliverer,
                pickup_date,
            };
            (change, None)
        } else if identity.has(Role::Courier) {
            if request.deliverer.is_some() || pickup_date.is_some() {
                return Err(OrderError::Forbidden(
                    "couriers may only change the order status".to_string(),
                ));
            }
            let courier = self.caller_user(identity).await?;
            let change = OrderChange {
                status: request.status,
                ..OrderChange::default()
            };
            (change, Some(courier.id))
        } else {
            return Err(OrderError::Forbidden(
                "only admins and couriers can change orders".to_string(),
            ));
        };

        self.store
            .mutate_order(
                &lookup,
                Box::new(move |aggregate: &mut OrderAggregate| {
                    if let Some(courier) = assigned_to
                        && aggregate.order.deliverer != Some(courier)
                    {
                        return Err(OrderError::Forbidden(
                            "order is not assigned to you".to_string(),
                        ));
                    }
                    lifecycle::change_order(aggregate, &change)
                }),
            )
            .await
    }

    /// Buyer cancellation of their own order.
    ///
    /// # Errors
    ///
    /// - `OrderError::OrderNotFound` if the order is missing or not the caller's
    /// - `OrderError::InvalidTransition` if the order already completed
    #[tracing::instrument(skip(self, identity), fields(caller = %identity.email))]
    pub async fn cancel_order(
        &self,
        identity: &Identity,
        codename: &str,
    ) -> Result<OrderAggregate, OrderError> {
        let lookup = order_lookup(codename)?;
        let email = identity.email.clone();

        self.store
            .mutate_order(
                &lookup,
                Box::new(move |aggregate: &mut OrderAggregate| {
                    if aggregate.order.email != email {
                        return Err(OrderError::OrderNotFound);
                    }
                    lifecycle::cancel_by_buyer(aggregate)
                }),
            )
            .await
    }

    /// Edit one shop-order's status, note or collector.
    ///
    /// Admins and couriers may edit any shop-order, but only admins assign
    /// collectors. Farmers may edit their own shop's.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the caller is outside the shop-order's scope
    /// - `OrderError::UnknownUser` if the collector is not a courier
    /// - `OrderError::ShopOrderNotFound` / `OrderError::InvalidTransition`
    #[tracing::instrument(skip(self, identity, request), fields(caller = %identity.email))]
    pub async fn edit_shop_order(
        &self,
        identity: &Identity,
        id: ShopOrderId,
        request: EditShopOrderRequest,
    ) -> Result<OrderAggregate, OrderError> {
        let (scope, collector) = if identity.is_admin() {
            let collector = match request.collector.as_deref() {
                Some(email) => Some(self.resolve_courier(email).await?),
                None => None,
            };
            (ShopOrderScope::Any, collector)
        } else {
            if request.collector.is_some() {
                return Err(OrderError::Forbidden(
                    "only admins can assign collectors".to_string(),
                ));
            }
            if identity.has(Role::Courier) {
                (ShopOrderScope::Any, None)
            } else {
                let shop = self.owned_shop(identity).await?;
                (ShopOrderScope::Shop(shop.id), None)
            }
        };

        let edit = ShopOrderEdit {
            status: request.status,
            message: request.message,
            collector,
        };

        self.store
            .mutate_order(
                &OrderLookup::ShopOrder(id),
                Box::new(move |aggregate: &mut OrderAggregate| {
                    let shop_order = aggregate
                        .shop_order(id)
                        .ok_or(OrderError::ShopOrderNotFound)?;
                    let allowed = match scope {
                        ShopOrderScope::Any => true,
                        ShopOrderScope::Shop(shop) => shop_order.shop_id == shop,
                    };
                    if !allowed {
                        return Err(OrderError::Forbidden(
                            "shop order is outside your scope".to_string(),
                        ));
                    }
                    lifecycle::edit_shop_order(aggregate, id, &edit)
                }),
            )
            .await
    }

    /// Orders visible to the caller, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn orders_for(&self, identity: &Identity) -> Result<Vec<OrderAggregate>, OrderError> {
        Ok(self
            .store
            .list_orders(&queries::orders_visible_to(identity))
            .await?)
    }

    /// Shop-orders for the caller's shop, by pickup date.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the caller owns no shop
    /// - `OrderError::Repository` if the store fails
    pub async fn shop_orders_for(
        &self,
        identity: &Identity,
    ) -> Result<Vec<ShopOrderListing>, OrderError> {
        let shop = self.owned_shop(identity).await?;
        Ok(self
            .store
            .list_shop_orders(&queries::shop_orders_of(shop.id))
            .await?)
    }

    /// Orders the calling courier is delivering.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the caller has no account
    /// - `OrderError::Repository` if the store fails
    pub async fn deliveries_for(
        &self,
        identity: &Identity,
    ) -> Result<Vec<OrderAggregate>, OrderError> {
        let courier = self.caller_user(identity).await?;
        Ok(self
            .store
            .list_orders(&queries::deliveries_of(courier.id))
            .await?)
    }

    /// Shop-orders the calling courier collects from `today` on.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the caller has no account
    /// - `OrderError::Repository` if the store fails
    pub async fn pickups_for(
        &self,
        identity: &Identity,
        today: NaiveDate,
    ) -> Result<Vec<ShopOrderListing>, OrderError> {
        let courier = self.caller_user(identity).await?;
        Ok(self
            .store
            .list_shop_orders(&queries::pickups_of(courier.id, today))
            .await?)
    }

    /// Every user who can be assigned as deliverer or collector.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn couriers(&self) -> Result<Vec<User>, OrderError> {
        Ok(self.store.users_with_role(Role::Courier).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn caller_user(&self, identity: &Identity) -> Result<User, OrderError> {
        self.store
            .user_by_email(&identity.email)
            .await?
            .ok_or_else(|| {
                OrderError::Forbidden("no account is registered for this identity".to_string())
            })
    }

    async fn owned_shop(&self, identity: &Identity) -> Result<Shop, OrderError> {
        let user = self.caller_user(identity).await?;
        self.store
            .shop_owned_by(user.id)
            .await?
            .ok_or_else(|| OrderError::Forbidden("no shop is registered to this account".to_string()))
    }

    async fn resolve_courier(&self, raw_email: &str) -> Result<UserId, OrderError> {
        let unknown = || OrderError::UnknownUser(raw_email.to_string());
        let email = Email::parse(raw_email).map_err(|_| unknown())?;
        self.store
            .user_by_email(&email)
            .await?
            .filter(|user| user.permissions.contains(Role::Courier) && !user.temporary)
            .map(|user| user.id)
            .ok_or_else(unknown)
    }
}

fn required(value: String, field: &str) -> Result<String, OrderError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OrderError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn order_lookup(codename: &str) -> Result<OrderLookup, OrderError> {
    Codename::parse(codename)
        .map(OrderLookup::Codename)
        .map_err(|_| OrderError::OrderNotFound)
}

fn parse_pickup_date(raw: &str) -> Result<NaiveDate, OrderError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| OrderError::Validation(format!("pickupDate must be YYYY-MM-DD, got {raw:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pickup_date() {
        assert_eq!(
            parse_pickup_date("2026-05-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
        );
        assert!(matches!(
            parse_pickup_date("01/05/2026"),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  1 Orchard Lane ".to_string(), "address").unwrap(), "1 Orchard Lane");
        assert!(matches!(
            required("   ".to_string(), "address"),
            Err(OrderError::Validation(message)) if message == "address is required"
        ));
    }

    #[test]
    fn test_order_lookup_rejects_malformed_codename() {
        assert!(matches!(order_lookup("NOT/VALID"), Err(OrderError::OrderNotFound)));
        assert!(matches!(order_lookup("ab12cd34"), Ok(OrderLookup::Codename(_))));
    }

    #[test]
    fn test_place_order_request_deserializes_camel_case() {
        let request: PlaceOrderRequest = serde_json::from_str(
            r#"{
                "user": {"email": "guest@example.com", "temporary": true},
                "address": "1 Orchard Lane",
                "paymentType": "cash",
                "cancelIfMissing": true,
                "orderedProducts": [{"product": {"codename": "widget"}, "quantity": 2}]
            }"#,
        )
        .unwrap();

        assert!(request.cancel_if_missing);
        assert_eq!(request.payment_type, "cash");
        assert_eq!(request.ordered_products[0].product.codename, "widget");
        assert!(request.user.unwrap().temporary);
    }

    #[test]
    fn test_change_request_rejects_unknown_status() {
        let result = serde_json::from_str::<ChangeOrderRequest>(r#"{"status": 9}"#);
        assert!(result.is_err());

        let request: ChangeOrderRequest =
            serde_json::from_str(r#"{"status": 2, "pickupDate": "2026-05-01"}"#).unwrap();
        assert_eq!(request.status, Some(OrderStatus::Confirmed));
    }
}
