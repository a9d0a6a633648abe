//! Order and shop-order state machine.
//!
//! Every function here edits an [`OrderAggregate`] in memory and returns the
//! [`Effects`] the store must apply alongside the row updates. The store runs
//! them while the aggregate is locked, so a transition and its cascade are
//! always persisted together.
//!
//! ```text
//! shop-order Accepted  -> order Fulfilling once no sibling is Pending
//! shop-order Cancelled -> order Cancelled (cancelIfMissing) or total reduced
//! order Completed      -> temporary buyer deleted
//! order Cancelled      -> active shop-orders Cancelled
//! ```

use chrono::NaiveDate;

use harvest_core::{OrderStatus, ShopOrderId, ShopOrderStatus, UserId};

use super::OrderError;
use super::pricing;
use crate::models::{Effects, OrderAggregate};

/// Privileged edit of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderChange {
    /// New status.
    pub status: Option<OrderStatus>,
    /// Courier to assign.
    pub deliverer: Option<UserId>,
    /// Pickup day to set.
    pub pickup_date: Option<NaiveDate>,
}

/// Edit of one shop-order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShopOrderEdit {
    /// New status.
    pub status: Option<ShopOrderStatus>,
    /// New shop-facing note.
    pub message: Option<String>,
    /// Courier to assign for pickup.
    pub collector: Option<UserId>,
}

/// Apply a privileged [`OrderChange`].
///
/// # Errors
///
/// Returns `OrderError::InvalidTransition` when reopening a finished order.
pub fn change_order(
    aggregate: &mut OrderAggregate,
    change: &OrderChange,
) -> Result<Effects, OrderError> {
    if let Some(deliverer) = change.deliverer {
        aggregate.order.deliverer = Some(deliverer);
    }
    if let Some(date) = change.pickup_date {
        aggregate.order.pickup_date = Some(date);
    }
    match change.status {
        Some(status) => set_order_status(aggregate, status),
        None => Ok(Effects::default()),
    }
}

/// Cancel on behalf of the buyer.
///
/// Cancelling twice is a no-op. The cascade runs exactly as for a
/// privileged cancellation.
///
/// # Errors
///
/// Returns `OrderError::InvalidTransition` if the order is already completed.
pub fn cancel_by_buyer(aggregate: &mut OrderAggregate) -> Result<Effects, OrderError> {
    match aggregate.order.status {
        OrderStatus::Completed => Err(OrderError::InvalidTransition(
            "a completed order cannot be cancelled".to_string(),
        )),
        OrderStatus::Cancelled => Ok(Effects::default()),
        _ => set_order_status(aggregate, OrderStatus::Cancelled),
    }
}

/// Move the order to `status` and run the order-level cascade.
///
/// Completed and cancelled orders are final.
///
/// # Errors
///
/// Returns `OrderError::InvalidTransition` when moving a completed or
/// cancelled order to any other status.
pub fn set_order_status(
    aggregate: &mut OrderAggregate,
    status: OrderStatus,
) -> Result<Effects, OrderError> {
    let previous = aggregate.order.status;
    if previous == status {
        return Ok(Effects::default());
    }
    if previous.is_terminal() {
        return Err(OrderError::InvalidTransition(format!(
            "a {previous} order cannot be reopened"
        )));
    }

    aggregate.order.status = status;
    tracing::info!(
        order = %aggregate.order.codename,
        from = %previous,
        to = %status,
        "Order status changed"
    );
    Ok(on_order_change(aggregate, previous))
}

/// Cascade an order status change to its children.
pub fn on_order_change(aggregate: &mut OrderAggregate, previous: OrderStatus) -> Effects {
    match aggregate.order.status {
        OrderStatus::Completed if previous != OrderStatus::Completed => Effects {
            delete_temporary_buyer: Some(aggregate.order.email.clone()),
        },
        OrderStatus::Cancelled => {
            for shop_order in &mut aggregate.shop_orders {
                if !shop_order.status.is_terminal() {
                    shop_order.status = ShopOrderStatus::Cancelled;
                }
            }
            Effects::default()
        }
        _ => Effects::default(),
    }
}

/// Apply a [`ShopOrderEdit`] and cascade any status change to the order.
///
/// # Errors
///
/// - `OrderError::ShopOrderNotFound` if `id` is not part of the aggregate
/// - `OrderError::InvalidTransition` when the parent order is finished or the
///   shop-order was cancelled
pub fn edit_shop_order(
    aggregate: &mut OrderAggregate,
    id: ShopOrderId,
    edit: &ShopOrderEdit,
) -> Result<Effects, OrderError> {
    let order_status = aggregate.order.status;
    let shop_order = aggregate
        .shop_order_mut(id)
        .ok_or(OrderError::ShopOrderNotFound)?;
    let previous = shop_order.status;
    let new_status = edit.status.filter(|status| *status != previous);

    if new_status.is_some() {
        if order_status.is_terminal() {
            return Err(OrderError::InvalidTransition(format!(
                "order is already {order_status}"
            )));
        }
        if previous == ShopOrderStatus::Cancelled {
            return Err(OrderError::InvalidTransition(
                "a cancelled shop order cannot be reopened".to_string(),
            ));
        }
    }

    if let Some(message) = &edit.message {
        shop_order.message.clone_from(message);
    }
    if let Some(collector) = edit.collector {
        shop_order.collector = Some(collector);
    }

    let Some(status) = new_status else {
        return Ok(Effects::default());
    };
    shop_order.status = status;
    tracing::info!(
        order = %aggregate.order.codename,
        shop_order = %id,
        from = %previous,
        to = %status,
        "Shop order status changed"
    );
    Ok(on_shop_order_change(aggregate, id, previous))
}

/// Cascade a shop-order status change to its order.
pub fn on_shop_order_change(
    aggregate: &mut OrderAggregate,
    id: ShopOrderId,
    previous: ShopOrderStatus,
) -> Effects {
    let Some(status) = aggregate.shop_order(id).map(|so| so.status) else {
        return Effects::default();
    };

    match status {
        ShopOrderStatus::Accepted => {
            let any_pending = aggregate
                .shop_orders
                .iter()
                .any(|so| so.status == ShopOrderStatus::Pending);
            if !any_pending && aggregate.order.status < OrderStatus::Fulfilling {
                aggregate.order.status = OrderStatus::Fulfilling;
                tracing::info!(
                    order = %aggregate.order.codename,
                    "Every shop accepted, order is fulfilling"
                );
            }
            Effects::default()
        }
        ShopOrderStatus::Cancelled if previous != ShopOrderStatus::Cancelled => {
            if aggregate.order.cancel_if_missing {
                let before = aggregate.order.status;
                aggregate.order.status = OrderStatus::Cancelled;
                tracing::info!(
                    order = %aggregate.order.codename,
                    shop_order = %id,
                    "Shop dropped out, cancelling order"
                );
                on_order_change(aggregate, before)
            } else {
                let removed = pricing::adjust_total(aggregate, id);
                tracing::info!(
                    order = %aggregate.order.codename,
                    shop_order = %id,
                    removed = %removed,
                    total = %aggregate.order.total_price,
                    "Shop dropped out, total reduced"
                );
                Effects::default()
            }
        }
        _ => Effects::default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use harvest_core::{
        Codename, Email, Money, OrderId, OrderedProductId, ProductId, ShopId,
    };

    use super::*;
    use crate::models::{Order, OrderedProduct, ShopOrder};

    /// An order with one shop-order per `(price, quantity)` line.
    fn aggregate(lines: &[(&str, i32)], cancel_if_missing: bool) -> OrderAggregate {
        let order_id = OrderId::generate();
        let mut shop_orders = Vec::new();
        let mut ordered_products = Vec::new();
        let mut total = Decimal::ZERO;

        for (i, (price, quantity)) in lines.iter().enumerate() {
            let shop_order = ShopOrder {
                id: ShopOrderId::generate(),
                order_id,
                shop_id: ShopId::generate(),
                shop_name: format!("Farm {i}"),
                status: ShopOrderStatus::Pending,
                message: String::new(),
                collector: None,
            };
            let unit_price = Decimal::from_str(price).unwrap();
            total += unit_price * Decimal::from(*quantity);
            ordered_products.push(OrderedProduct {
                id: OrderedProductId::generate(),
                order_id,
                shop_order_id: shop_order.id,
                product_id: ProductId::generate(),
                product_codename: Codename::parse(&format!("product-{i}")).unwrap(),
                product_name: format!("Product {i}"),
                quantity: *quantity,
                unit_price,
            });
            shop_orders.push(shop_order);
        }

        OrderAggregate {
            order: Order {
                id: order_id,
                codename: Codename::order_identifier(),
                email: Email::parse("guest@example.com").unwrap(),
                status: OrderStatus::Placed,
                note: String::new(),
                address: "1 Orchard Lane".to_string(),
                payment_type: "cash".to_string(),
                total_price: Money::from_decimal(total),
                cancel_if_missing,
                pickup_date: None,
                deliverer: None,
                created_at: Utc::now(),
            },
            shop_orders,
            ordered_products,
        }
    }

    fn set_status(status: ShopOrderStatus) -> ShopOrderEdit {
        ShopOrderEdit {
            status: Some(status),
            ..ShopOrderEdit::default()
        }
    }

    #[test]
    fn test_accept_waits_for_pending_sibling() {
        let mut agg = aggregate(&[("10.00", 1), ("5.00", 1)], false);
        let first = agg.shop_orders[0].id;
        let second = agg.shop_orders[1].id;

        edit_shop_order(&mut agg, first, &set_status(ShopOrderStatus::Accepted)).unwrap();
        assert_eq!(agg.order.status, OrderStatus::Placed);

        edit_shop_order(&mut agg, second, &set_status(ShopOrderStatus::Accepted)).unwrap();
        assert_eq!(agg.order.status, OrderStatus::Fulfilling);
    }

    #[test]
    fn test_cancelled_shop_order_reduces_total() {
        let mut agg = aggregate(&[("10.00", 2), ("5.00", 1)], false);
        let second = agg.shop_orders[1].id;

        edit_shop_order(&mut agg, second, &set_status(ShopOrderStatus::Cancelled)).unwrap();

        assert_eq!(agg.order.total_price.to_string(), "20.00");
        assert_eq!(agg.order.status, OrderStatus::Placed);
        assert_eq!(agg.shop_orders[0].status, ShopOrderStatus::Pending);
    }

    #[test]
    fn test_sub_cent_total_tracks_remaining_lines() {
        let mut agg = aggregate(&[("0.004", 1), ("0.004", 1), ("0.004", 1)], false);
        assert_eq!(agg.order.total_price.to_string(), "0.01");
        let first = agg.shop_orders[0].id;
        let second = agg.shop_orders[1].id;
        let third = agg.shop_orders[2].id;

        // 0.012 -> 0.008 still rounds to a cent
        edit_shop_order(&mut agg, first, &set_status(ShopOrderStatus::Cancelled)).unwrap();
        assert_eq!(agg.order.total_price.to_string(), "0.01");

        // 0.008 -> 0.004 rounds to nothing
        edit_shop_order(&mut agg, second, &set_status(ShopOrderStatus::Cancelled)).unwrap();
        assert_eq!(agg.order.total_price.to_string(), "0.00");

        edit_shop_order(&mut agg, third, &set_status(ShopOrderStatus::Cancelled)).unwrap();
        assert_eq!(agg.order.total_price.to_string(), "0.00");
    }

    #[test]
    fn test_fulfilled_sibling_still_counts_after_cancellation() {
        let mut agg = aggregate(&[("0.006", 1), ("0.003", 1)], false);
        assert_eq!(agg.order.total_price.to_string(), "0.01");
        agg.shop_orders[0].status = ShopOrderStatus::Fulfilled;
        let second = agg.shop_orders[1].id;

        edit_shop_order(&mut agg, second, &set_status(ShopOrderStatus::Cancelled)).unwrap();
        assert_eq!(agg.order.total_price.to_string(), "0.01");
    }

    #[test]
    fn test_cancel_if_missing_cascades() {
        let mut agg = aggregate(&[("10.00", 2), ("5.00", 1)], true);
        let second = agg.shop_orders[1].id;

        edit_shop_order(&mut agg, second, &set_status(ShopOrderStatus::Cancelled)).unwrap();

        assert_eq!(agg.order.status, OrderStatus::Cancelled);
        assert!(
            agg.shop_orders
                .iter()
                .all(|so| so.status == ShopOrderStatus::Cancelled)
        );
        assert_eq!(agg.order.total_price.to_string(), "25.00");
    }

    #[test]
    fn test_fulfilled_shop_order_keeps_total() {
        let mut agg = aggregate(&[("10.00", 1)], true);
        let only = agg.shop_orders[0].id;
        agg.order.status = OrderStatus::Fulfilling;
        agg.shop_orders[0].status = ShopOrderStatus::Ready;

        edit_shop_order(&mut agg, only, &set_status(ShopOrderStatus::Fulfilled)).unwrap();

        assert_eq!(agg.order.status, OrderStatus::Fulfilling);
        assert_eq!(agg.order.total_price.to_string(), "10.00");
    }

    #[test]
    fn test_cancelled_shop_order_cannot_reopen() {
        let mut agg = aggregate(&[("10.00", 1), ("5.00", 1)], false);
        let first = agg.shop_orders[0].id;
        edit_shop_order(&mut agg, first, &set_status(ShopOrderStatus::Cancelled)).unwrap();

        let err =
            edit_shop_order(&mut agg, first, &set_status(ShopOrderStatus::Accepted)).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));
    }

    #[test]
    fn test_finished_order_freezes_shop_orders() {
        let mut agg = aggregate(&[("10.00", 1)], false);
        let only = agg.shop_orders[0].id;
        set_order_status(&mut agg, OrderStatus::Completed).unwrap();

        let err =
            edit_shop_order(&mut agg, only, &set_status(ShopOrderStatus::Accepted)).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));

        // Notes may still be edited
        let note = ShopOrderEdit {
            message: Some("left at the gate".to_string()),
            ..ShopOrderEdit::default()
        };
        edit_shop_order(&mut agg, only, &note).unwrap();
        assert_eq!(agg.shop_orders[0].message, "left at the gate");
    }

    #[test]
    fn test_completion_requests_buyer_cleanup_once() {
        let mut agg = aggregate(&[("10.00", 1)], false);

        let effects = set_order_status(&mut agg, OrderStatus::Completed).unwrap();
        assert_eq!(
            effects.delete_temporary_buyer,
            Some(Email::parse("guest@example.com").unwrap())
        );

        let again = set_order_status(&mut agg, OrderStatus::Completed).unwrap();
        assert_eq!(again, Effects::default());
    }

    #[test]
    fn test_order_cancel_cascades_to_active_shop_orders() {
        let mut agg = aggregate(&[("10.00", 1), ("5.00", 1)], false);
        agg.shop_orders[0].status = ShopOrderStatus::Fulfilled;

        set_order_status(&mut agg, OrderStatus::Cancelled).unwrap();

        assert_eq!(agg.shop_orders[0].status, ShopOrderStatus::Fulfilled);
        assert_eq!(agg.shop_orders[1].status, ShopOrderStatus::Cancelled);
    }

    #[test]
    fn test_buyer_cancel_rules() {
        let mut agg = aggregate(&[("10.00", 1)], false);
        cancel_by_buyer(&mut agg).unwrap();
        assert_eq!(agg.order.status, OrderStatus::Cancelled);
        assert_eq!(agg.shop_orders[0].status, ShopOrderStatus::Cancelled);

        // Second cancel is a no-op
        assert_eq!(cancel_by_buyer(&mut agg).unwrap(), Effects::default());

        let mut done = aggregate(&[("10.00", 1)], false);
        done.order.status = OrderStatus::Completed;
        assert!(matches!(
            cancel_by_buyer(&mut done),
            Err(OrderError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_cancelled_order_cannot_reopen() {
        let mut agg = aggregate(&[("10.00", 1)], false);
        set_order_status(&mut agg, OrderStatus::Cancelled).unwrap();
        assert!(matches!(
            set_order_status(&mut agg, OrderStatus::Placed),
            Err(OrderError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_completed_order_is_final() {
        let mut agg = aggregate(&[("10.00", 1)], false);
        set_order_status(&mut agg, OrderStatus::Completed).unwrap();

        for status in [OrderStatus::Placed, OrderStatus::Fulfilling, OrderStatus::Cancelled] {
            let err = set_order_status(&mut agg, status).unwrap_err();
            assert!(matches!(err, OrderError::InvalidTransition(_)));
            assert_eq!(agg.order.status, OrderStatus::Completed);
        }
        assert_eq!(agg.shop_orders[0].status, ShopOrderStatus::Pending);

        // Without a way back out, completion cleanup can only be requested once
        let again = set_order_status(&mut agg, OrderStatus::Completed).unwrap();
        assert_eq!(again, Effects::default());
    }

    #[test]
    fn test_change_order_assigns_courier_and_date() {
        let mut agg = aggregate(&[("10.00", 1)], false);
        let courier = UserId::generate();
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        change_order(
            &mut agg,
            &OrderChange {
                status: Some(OrderStatus::Confirmed),
                deliverer: Some(courier),
                pickup_date: Some(date),
            },
        )
        .unwrap();

        assert_eq!(agg.order.status, OrderStatus::Confirmed);
        assert_eq!(agg.order.deliverer, Some(courier));
        assert_eq!(agg.order.pickup_date, Some(date));
    }
}
