//! In-memory store.
//!
//! Every table lives behind a single mutex, so each trait call is atomic in
//! the same way a `PostgreSQL` transaction is. Mutations run on a copy of the
//! aggregate and only replace the stored one when they succeed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use harvest_core::{
    Codename, Email, OrderId, OrderStatus, OrderedProductId, ProductId, Role, ShopId,
    ShopOrderId, ShopOrderStatus, UserId,
};

use super::{InventoryStore, OrderMutation, OrderStore, RepositoryError, UserStore};
use crate::models::{
    NewOrder, NewUser, Order, OrderAggregate, OrderFilter, OrderLookup, OrderedProduct,
    Product, Shop, ShopOrder, ShopOrderFilter, ShopOrderListing, User,
};
use crate::services::orders::OrderError;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    shops: Vec<Shop>,
    products: Vec<Product>,
    orders: Vec<OrderAggregate>,
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Writes only happen after every check passed, so a poisoned lock is safe to reuse.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_string()));
        }
        let user = insert_user(&mut tables, user);
        Ok(user)
    }

    /// Create a shop for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a shop or
    /// the codename is taken.
    pub fn create_shop(&self, owner: UserId, name: &str) -> Result<Shop, RepositoryError> {
        let mut tables = self.tables();
        let codename = Codename::slugify(name);
        if tables
            .shops
            .iter()
            .any(|s| s.owner_id == owner || s.codename == codename)
        {
            return Err(RepositoryError::Conflict("shop already exists".to_string()));
        }
        let shop = Shop {
            id: ShopId::generate(),
            owner_id: owner,
            name: name.to_string(),
            codename,
        };
        tables.shops.push(shop.clone());
        Ok(shop)
    }

    /// Add a public product to a shop's catalogue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the codename is taken.
    pub fn create_product(
        &self,
        shop_id: ShopId,
        name: &str,
        price: Decimal,
        quantity: i32,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.tables();
        let codename = Codename::slugify(name);
        if tables.products.iter().any(|p| p.codename == codename) {
            return Err(RepositoryError::Conflict("product already exists".to_string()));
        }
        let product = Product {
            id: ProductId::generate(),
            shop_id,
            codename,
            name: name.to_string(),
            price,
            quantity,
            public: true,
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    /// Hide or show a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has `codename`.
    pub fn set_product_public(&self, codename: &Codename, public: bool) -> Result<(), RepositoryError> {
        let mut tables = self.tables();
        let product = tables
            .products
            .iter_mut()
            .find(|p| &p.codename == codename)
            .ok_or(RepositoryError::NotFound)?;
        product.public = public;
        Ok(())
    }

    /// Current state of a product.
    #[must_use]
    pub fn product(&self, codename: &Codename) -> Option<Product> {
        self.tables()
            .products
            .iter()
            .find(|p| &p.codename == codename)
            .cloned()
    }

    /// Current state of a user.
    #[must_use]
    pub fn user(&self, email: &Email) -> Option<User> {
        self.tables().users.iter().find(|u| &u.email == email).cloned()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.tables().orders.len()
    }
}

fn insert_user(tables: &mut Tables, user: &NewUser) -> User {
    let user = User {
        id: UserId::generate(),
        email: user.email.clone(),
        name: user.name.clone(),
        permissions: user.permissions,
        temporary: user.temporary,
    };
    tables.users.push(user.clone());
    user
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn products_by_codename(
        &self,
        codenames: &[Codename],
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .tables()
            .products
            .iter()
            .filter(|p| codenames.contains(&p.codename))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self.user(email))
    }

    async fn shop_owned_by(&self, owner: UserId) -> Result<Option<Shop>, RepositoryError> {
        Ok(self
            .tables()
            .shops
            .iter()
            .find(|s| s.owner_id == owner)
            .cloned())
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self
            .tables()
            .users
            .iter()
            .filter(|u| u.permissions.contains(role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(users)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, new: NewOrder) -> Result<OrderAggregate, RepositoryError> {
        let mut tables = self.tables();

        if let Some(buyer) = &new.temporary_buyer
            && tables.users.iter().any(|u| u.email == buyer.email)
        {
            return Err(RepositoryError::Conflict("email already exists".to_string()));
        }
        if tables.orders.iter().any(|o| o.order.codename == new.codename) {
            return Err(RepositoryError::Conflict(
                "order codename already exists".to_string(),
            ));
        }

        // Check every line before touching stock.
        let lines = new.shop_orders.iter().flat_map(|so| &so.lines);
        for line in lines.clone() {
            let product = tables
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or(RepositoryError::NotFound)?;
            if product.quantity < line.quantity {
                return Err(RepositoryError::OutOfStock {
                    product: product.codename.clone(),
                    available: product.quantity,
                });
            }
        }

        let order_id = OrderId::generate();
        let mut shop_orders = Vec::with_capacity(new.shop_orders.len());
        let mut ordered_products = Vec::new();
        for new_shop_order in &new.shop_orders {
            let shop = tables
                .shops
                .iter()
                .find(|s| s.id == new_shop_order.shop_id)
                .ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "product belongs to unknown shop {}",
                        new_shop_order.shop_id
                    ))
                })?;
            let shop_order = ShopOrder {
                id: ShopOrderId::generate(),
                order_id,
                shop_id: shop.id,
                shop_name: shop.name.clone(),
                status: ShopOrderStatus::Pending,
                message: String::new(),
                collector: None,
            };

            for line in &new_shop_order.lines {
                let name = tables
                    .products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                ordered_products.push(OrderedProduct {
                    id: OrderedProductId::generate(),
                    order_id,
                    shop_order_id: shop_order.id,
                    product_id: line.product_id,
                    product_codename: line.codename.clone(),
                    product_name: name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                });
            }
            shop_orders.push(shop_order);
        }

        for line in lines {
            if let Some(product) = tables.products.iter_mut().find(|p| p.id == line.product_id) {
                product.quantity -= line.quantity;
            }
        }
        if let Some(buyer) = &new.temporary_buyer {
            insert_user(&mut tables, buyer);
        }

        let aggregate = OrderAggregate {
            order: Order {
                id: order_id,
                codename: new.codename,
                email: new.email,
                status: OrderStatus::Placed,
                note: new.note,
                address: new.address,
                payment_type: new.payment_type,
                total_price: new.total_price,
                cancel_if_missing: new.cancel_if_missing,
                pickup_date: None,
                deliverer: None,
                created_at: Utc::now(),
            },
            shop_orders,
            ordered_products,
        };
        tables.orders.push(aggregate.clone());
        Ok(aggregate)
    }

    async fn mutate_order(
        &self,
        lookup: &OrderLookup,
        mutation: OrderMutation,
    ) -> Result<OrderAggregate, OrderError> {
        let mut tables = self.tables();

        let index = match lookup {
            OrderLookup::Codename(codename) => tables
                .orders
                .iter()
                .position(|o| &o.order.codename == codename)
                .ok_or(OrderError::OrderNotFound)?,
            OrderLookup::ShopOrder(id) => tables
                .orders
                .iter()
                .position(|o| o.shop_order(*id).is_some())
                .ok_or(OrderError::ShopOrderNotFound)?,
        };

        let Some(stored) = tables.orders.get(index) else {
            return Err(OrderError::OrderNotFound);
        };
        let mut aggregate = stored.clone();
        let effects = mutation(&mut aggregate)?;

        if let Some(email) = &effects.delete_temporary_buyer {
            tables.users.retain(|u| !(u.temporary && &u.email == email));
        }
        if let Some(stored) = tables.orders.get_mut(index) {
            stored.clone_from(&aggregate);
        }
        Ok(aggregate)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderAggregate>, RepositoryError> {
        // Newest first; later inserts win ties on the timestamp.
        let mut orders: Vec<OrderAggregate> = self
            .tables()
            .orders
            .iter()
            .rev()
            .filter(|o| filter.matches(&o.order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(orders)
    }

    async fn list_shop_orders(
        &self,
        filter: &ShopOrderFilter,
    ) -> Result<Vec<ShopOrderListing>, RepositoryError> {
        let tables = self.tables();
        let mut listings: Vec<ShopOrderListing> = tables
            .orders
            .iter()
            .flat_map(|aggregate| {
                aggregate
                    .shop_orders
                    .iter()
                    .filter(|so| filter.matches(so, &aggregate.order))
                    .map(|so| ShopOrderListing {
                        shop_order: so.clone(),
                        order: aggregate.order.clone(),
                        ordered_products: aggregate.lines_of(so.id).cloned().collect(),
                    })
            })
            .collect();
        drop(tables);

        // Pickup date ascending with undated last, then placement.
        listings.sort_by_key(|l| {
            (
                l.order.pickup_date.is_none(),
                l.order.pickup_date,
                l.order.created_at,
            )
        });
        Ok(listings)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
