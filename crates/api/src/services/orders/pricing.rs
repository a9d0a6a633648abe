//! Pricing aggregator.
//!
//! Totals are computed from the unit price captured at placement, never from a
//! product's current price. Line values are summed exactly and the sum is
//! rounded once to cents, half-away-from-zero.

use rust_decimal::Decimal;

use harvest_core::{Money, ShopOrderId, ShopOrderStatus};

use crate::models::{NewOrderLine, NewShopOrder, OrderAggregate};

/// Total of a cart about to be placed.
#[must_use]
pub fn order_total(shop_orders: &[NewShopOrder]) -> Money {
    Money::from_decimal(
        shop_orders
            .iter()
            .flat_map(|so| &so.lines)
            .map(line_value)
            .sum(),
    )
}

/// Exact value of one validated line.
#[must_use]
pub fn line_value(line: &NewOrderLine) -> Decimal {
    line.unit_price * Decimal::from(line.quantity)
}

/// Remove a cancelled shop-order's contribution from the order total.
///
/// The total is decremented in place, never recomputed from scratch, and
/// never drops below zero. The amount removed is the change in the rounded
/// value of the lines still counted, so sub-cent prices leave the total equal
/// to what a fresh placement of the remaining lines would charge.
pub fn adjust_total(aggregate: &mut OrderAggregate, cancelled: ShopOrderId) -> Money {
    let counted: Decimal = aggregate
        .ordered_products
        .iter()
        .filter(|line| {
            line.shop_order_id == cancelled
                || aggregate
                    .shop_order(line.shop_order_id)
                    .is_some_and(|so| so.status != ShopOrderStatus::Cancelled)
        })
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();
    let dropped: Decimal = aggregate
        .lines_of(cancelled)
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();

    let removed = Money::from_decimal(
        Money::from_decimal(counted).amount() - Money::from_decimal(counted - dropped).amount(),
    );
    aggregate.order.total_price = aggregate.order.total_price.saturating_sub(removed);
    removed
}
