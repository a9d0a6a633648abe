//! Order aggregate persistence.
//!
//! Placement and every later state change run inside a single transaction.
//! Stock is taken with a conditional `UPDATE .. WHERE quantity >= $n` so two
//! concurrent placements can never oversell a product.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use harvest_core::{
    Codename, Email, Money, OrderId, OrderStatus, OrderedProductId, ProductId, ShopId,
    ShopOrderId, ShopOrderStatus, UserId,
};

use super::{OrderMutation, OrderStore, PgStore, RepositoryError, conflict_on_unique};
use crate::models::{
    NewOrder, Order, OrderAggregate, OrderFilter, OrderLookup, OrderedProduct, ShopOrder,
    ShopOrderFilter, ShopOrderListing,
};
use crate::services::orders::OrderError;

// =============================================================================
// Internal Row Types
// =============================================================================

const ORDER_COLUMNS: &str = "o.id, o.codename, o.email, o.status, o.note, o.address, \
     o.payment_type, o.total_price, o.cancel_if_missing, o.pickup_date, o.deliverer_id, \
     o.created_at";

const SHOP_ORDER_COLUMNS: &str = "so.id, so.order_id, so.shop_id, s.name AS shop_name, \
     so.status, so.message, so.collector_id";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    codename: String,
    email: String,
    status: i16,
    note: String,
    address: String,
    payment_type: String,
    total_price: Decimal,
    cancel_if_missing: bool,
    pickup_date: Option<NaiveDate>,
    deliverer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            codename: Codename::parse(&row.codename)
                .map_err(|e| corrupt("order codename", &e))?,
            email: Email::parse(&row.email).map_err(|e| corrupt("order email", &e))?,
            status: OrderStatus::try_from(row.status).map_err(|e| corrupt("order status", &e))?,
            note: row.note,
            address: row.address,
            payment_type: row.payment_type,
            total_price: Money::from_decimal(row.total_price),
            cancel_if_missing: row.cancel_if_missing,
            pickup_date: row.pickup_date,
            deliverer: row.deliverer_id.map(UserId::new),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopOrderRow {
    id: Uuid,
    order_id: Uuid,
    shop_id: Uuid,
    shop_name: String,
    status: i16,
    message: String,
    collector_id: Option<Uuid>,
}

impl TryFrom<ShopOrderRow> for ShopOrder {
    type Error = RepositoryError;

    fn try_from(row: ShopOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ShopOrderId::new(row.id),
            order_id: OrderId::new(row.order_id),
            shop_id: ShopId::new(row.shop_id),
            shop_name: row.shop_name,
            status: ShopOrderStatus::try_from(row.status)
                .map_err(|e| corrupt("shop order status", &e))?,
            message: row.message,
            collector: row.collector_id.map(UserId::new),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    order_id: Uuid,
    shop_order_id: Uuid,
    product_id: Uuid,
    product_codename: String,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<LineRow> for OrderedProduct {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderedProductId::new(row.id),
            order_id: OrderId::new(row.order_id),
            shop_order_id: ShopOrderId::new(row.shop_order_id),
            product_id: ProductId::new(row.product_id),
            product_codename: Codename::parse(&row.product_codename)
                .map_err(|e| corrupt("product codename", &e))?,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        })
    }
}

fn corrupt(what: &str, err: &dyn std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {err}"))
}

// =============================================================================
// Loading
// =============================================================================

async fn fetch_shop_orders(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<Vec<ShopOrder>, RepositoryError> {
    let rows = sqlx::query_as::<_, ShopOrderRow>(&format!(
        "SELECT {SHOP_ORDER_COLUMNS}
         FROM market.shop_orders so
         JOIN market.shops s ON s.id = so.shop_id
         WHERE so.order_id = ANY($1)
         ORDER BY s.name, so.id"
    ))
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(ShopOrder::try_from).collect()
}

async fn fetch_lines(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<Vec<OrderedProduct>, RepositoryError> {
    let rows = sqlx::query_as::<_, LineRow>(
        r"
        SELECT op.id, op.order_id, op.shop_order_id, op.product_id,
               p.codename AS product_codename, p.name AS product_name,
               op.quantity, op.unit_price
        FROM market.ordered_products op
        JOIN market.products p ON p.id = op.product_id
        WHERE op.order_id = ANY($1)
        ORDER BY p.name, op.id
        ",
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(OrderedProduct::try_from).collect()
}

/// Attach shop-orders and lines to `orders`, keeping their order.
async fn assemble(
    conn: &mut PgConnection,
    orders: Vec<Order>,
) -> Result<Vec<OrderAggregate>, RepositoryError> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
    let mut shop_orders: HashMap<OrderId, Vec<ShopOrder>> = HashMap::new();
    for so in fetch_shop_orders(conn, &ids).await? {
        shop_orders.entry(so.order_id).or_default().push(so);
    }
    let mut lines: HashMap<OrderId, Vec<OrderedProduct>> = HashMap::new();
    for line in fetch_lines(conn, &ids).await? {
        lines.entry(line.order_id).or_default().push(line);
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderAggregate {
            shop_orders: shop_orders.remove(&order.id).unwrap_or_default(),
            ordered_products: lines.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

async fn fetch_aggregate(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<OrderAggregate>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM market.orders o WHERE o.id = $1"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let order = Order::try_from(row)?;
    Ok(assemble(conn, vec![order]).await?.pop())
}

// =============================================================================
// Writing
// =============================================================================

/// Take `quantity` units of a product, or report how many are left.
async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    codename: &Codename,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE market.products
        SET quantity = quantity - $2
        WHERE id = $1 AND quantity >= $2
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM market.products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
        return Err(RepositoryError::OutOfStock {
            product: codename.clone(),
            available: available.unwrap_or(0),
        });
    }
    Ok(())
}

async fn write_changes(
    conn: &mut PgConnection,
    before: &OrderAggregate,
    after: &OrderAggregate,
) -> Result<(), RepositoryError> {
    if before.order != after.order {
        sqlx::query(
            r"
            UPDATE market.orders
            SET status = $2, total_price = $3, pickup_date = $4, deliverer_id = $5
            WHERE id = $1
            ",
        )
        .bind(after.order.id)
        .bind(after.order.status.code())
        .bind(after.order.total_price.amount())
        .bind(after.order.pickup_date)
        .bind(after.order.deliverer)
        .execute(&mut *conn)
        .await?;
    }

    for shop_order in &after.shop_orders {
        if before.shop_order(shop_order.id) == Some(shop_order) {
            continue;
        }
        sqlx::query(
            r"
            UPDATE market.shop_orders
            SET status = $2, message = $3, collector_id = $4
            WHERE id = $1
            ",
        )
        .bind(shop_order.id)
        .bind(shop_order.status.code())
        .bind(&shop_order.message)
        .bind(shop_order.collector)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn delete_temporary_user(
    conn: &mut PgConnection,
    email: &Email,
) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM market.users WHERE email = $1 AND temporary")
        .bind(email.as_str())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() > 0 {
        tracing::info!(email = %email, "Temporary buyer removed");
    }
    Ok(())
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, new: NewOrder) -> Result<OrderAggregate, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        if let Some(buyer) = &new.temporary_buyer {
            sqlx::query(
                r"
                INSERT INTO market.users (id, email, name, permissions, temporary)
                VALUES ($1, $2, $3, $4, TRUE)
                ",
            )
            .bind(UserId::generate())
            .bind(buyer.email.as_str())
            .bind(&buyer.name)
            .bind(buyer.permissions.names())
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "email"))?;
        }

        // Lock products in a stable order so concurrent placements cannot deadlock.
        let mut lines: Vec<_> = new.shop_orders.iter().flat_map(|so| &so.lines).collect();
        lines.sort_by_key(|line| line.product_id);
        for line in lines {
            decrement_stock(&mut tx, line.product_id, &line.codename, line.quantity).await?;
        }

        let order_id = OrderId::generate();
        sqlx::query(
            r"
            INSERT INTO market.orders
                (id, codename, email, status, note, address, payment_type,
                 total_price, cancel_if_missing)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(order_id)
        .bind(new.codename.as_str())
        .bind(new.email.as_str())
        .bind(OrderStatus::Placed.code())
        .bind(&new.note)
        .bind(&new.address)
        .bind(&new.payment_type)
        .bind(new.total_price.amount())
        .bind(new.cancel_if_missing)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "order codename"))?;

        for shop_order in &new.shop_orders {
            let shop_order_id = ShopOrderId::generate();
            sqlx::query(
                r"
                INSERT INTO market.shop_orders (id, order_id, shop_id, status)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(shop_order_id)
            .bind(order_id)
            .bind(shop_order.shop_id)
            .bind(ShopOrderStatus::Pending.code())
            .execute(&mut *tx)
            .await?;

            for line in &shop_order.lines {
                sqlx::query(
                    r"
                    INSERT INTO market.ordered_products
                        (id, order_id, shop_order_id, product_id, quantity, unit_price)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ",
                )
                .bind(OrderedProductId::generate())
                .bind(order_id)
                .bind(shop_order_id)
                .bind(line.product_id)
                .bind(line.quantity)
                .bind(line.unit_price)
                .execute(&mut *tx)
                .await?;
            }
        }

        let aggregate = fetch_aggregate(&mut tx, order_id.as_uuid())
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(aggregate)
    }

    async fn mutate_order(
        &self,
        lookup: &OrderLookup,
        mutation: OrderMutation,
    ) -> Result<OrderAggregate, OrderError> {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;

        let locked: Option<Uuid> = match lookup {
            OrderLookup::Codename(codename) => {
                sqlx::query_scalar::<_, Uuid>(
                    "SELECT id FROM market.orders WHERE codename = $1 FOR UPDATE",
                )
                .bind(codename.as_str())
                .fetch_optional(&mut *tx)
                .await
            }
            OrderLookup::ShopOrder(id) => {
                sqlx::query_scalar::<_, Uuid>(
                    r"
                    SELECT o.id
                    FROM market.orders o
                    JOIN market.shop_orders so ON so.order_id = o.id
                    WHERE so.id = $1
                    FOR UPDATE OF o
                    ",
                )
                .bind(*id)
                .fetch_optional(&mut *tx)
                .await
            }
        }
        .map_err(RepositoryError::from)?;

        let Some(order_id) = locked else {
            return Err(match lookup {
                OrderLookup::Codename(_) => OrderError::OrderNotFound,
                OrderLookup::ShopOrder(_) => OrderError::ShopOrderNotFound,
            });
        };

        sqlx::query("SELECT id FROM market.shop_orders WHERE order_id = $1 FOR UPDATE")
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        let mut aggregate = fetch_aggregate(&mut tx, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        let before = aggregate.clone();

        let effects = mutation(&mut aggregate)?;

        write_changes(&mut tx, &before, &aggregate).await?;
        if let Some(email) = &effects.delete_temporary_buyer {
            delete_temporary_user(&mut tx, email).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(aggregate)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderAggregate>, RepositoryError> {
        let mut conn = self.pool().acquire().await?;

        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM market.orders o WHERE TRUE"
        ));
        if let Some(email) = &filter.email {
            query.push(" AND o.email = ").push_bind(email.as_str().to_owned());
        }
        if let Some(deliverer) = filter.deliverer {
            query.push(" AND o.deliverer_id = ").push_bind(deliverer);
        }
        if let Some(statuses) = &filter.statuses {
            let codes: Vec<i16> = statuses.iter().map(|s| s.code()).collect();
            query.push(" AND o.status = ANY(").push_bind(codes).push(")");
        }
        query.push(" ORDER BY o.created_at DESC, o.codename");

        let orders = query
            .build_query_as::<OrderRow>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        assemble(&mut conn, orders).await
    }

    async fn list_shop_orders(
        &self,
        filter: &ShopOrderFilter,
    ) -> Result<Vec<ShopOrderListing>, RepositoryError> {
        let mut conn = self.pool().acquire().await?;

        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {SHOP_ORDER_COLUMNS}
             FROM market.shop_orders so
             JOIN market.shops s ON s.id = so.shop_id
             JOIN market.orders o ON o.id = so.order_id
             WHERE TRUE"
        ));
        if let Some(shop) = filter.shop {
            query.push(" AND so.shop_id = ").push_bind(shop);
        }
        if let Some(collector) = filter.collector {
            query.push(" AND so.collector_id = ").push_bind(collector);
        }
        if let Some(statuses) = &filter.statuses {
            let codes: Vec<i16> = statuses.iter().map(|s| s.code()).collect();
            query.push(" AND so.status = ANY(").push_bind(codes).push(")");
        }
        if let Some(from) = filter.pickup_from {
            query.push(" AND o.pickup_date >= ").push_bind(from);
        }
        query.push(" ORDER BY o.pickup_date ASC NULLS LAST, o.created_at, so.id");

        let shop_orders = query
            .build_query_as::<ShopOrderRow>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(ShopOrder::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let order_ids: Vec<Uuid> = shop_orders.iter().map(|so| so.order_id.as_uuid()).collect();
        let orders: HashMap<OrderId, Order> = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM market.orders o WHERE o.id = ANY($1)"
        ))
        .bind(&order_ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|row| Order::try_from(row).map(|order| (order.id, order)))
        .collect::<Result<_, _>>()?;

        let mut lines: HashMap<ShopOrderId, Vec<OrderedProduct>> = HashMap::new();
        for line in fetch_lines(&mut conn, &order_ids).await? {
            lines.entry(line.shop_order_id).or_default().push(line);
        }

        shop_orders
            .into_iter()
            .map(|shop_order| {
                let order = orders
                    .get(&shop_order.order_id)
                    .cloned()
                    .ok_or(RepositoryError::NotFound)?;
                Ok::<_, RepositoryError>(ShopOrderListing {
                    ordered_products: lines.remove(&shop_order.id).unwrap_or_default(),
                    order,
                    shop_order,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }
}
