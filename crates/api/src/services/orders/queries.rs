//! Role-scoped listing filters.

use chrono::NaiveDate;

use harvest_core::{OrderStatus, ShopId, ShopOrderStatus, UserId};

use crate::models::{Identity, OrderFilter, ShopOrderFilter};

/// Admins see every order, anyone else only their own.
#[must_use]
pub fn orders_visible_to(identity: &Identity) -> OrderFilter {
    if identity.is_admin() {
        OrderFilter::default()
    } else {
        OrderFilter {
            email: Some(identity.email.clone()),
            ..OrderFilter::default()
        }
    }
}

/// Everything ordered from one shop.
#[must_use]
pub fn shop_orders_of(shop: ShopId) -> ShopOrderFilter {
    ShopOrderFilter {
        shop: Some(shop),
        ..ShopOrderFilter::default()
    }
}

/// Orders a courier is currently delivering.
#[must_use]
pub fn deliveries_of(courier: UserId) -> OrderFilter {
    OrderFilter {
        deliverer: Some(courier),
        statuses: Some(
            OrderStatus::ALL
                .into_iter()
                .filter(|status| status.is_in_delivery())
                .collect(),
        ),
        ..OrderFilter::default()
    }
}

/// Shop-orders a courier collects from `today` on.
#[must_use]
pub fn pickups_of(courier: UserId, today: NaiveDate) -> ShopOrderFilter {
    ShopOrderFilter {
        collector: Some(courier),
        statuses: Some(
            ShopOrderStatus::ALL
                .into_iter()
                .filter(|status| status.is_awaiting_pickup())
                .collect(),
        ),
        pickup_from: Some(today),
        ..ShopOrderFilter::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use harvest_core::{Email, Permissions, Role};

    use super::*;

    fn identity(roles: &[Role]) -> Identity {
        Identity::new(
            Email::parse("someone@example.com").unwrap(),
            roles.iter().copied().collect::<Permissions>(),
        )
    }

    #[test]
    fn test_admin_sees_all_orders() {
        let filter = orders_visible_to(&identity(&[Role::Admin]));
        assert!(filter.email.is_none());
        assert!(filter.statuses.is_none());
    }

    #[test]
    fn test_buyer_sees_own_orders() {
        let filter = orders_visible_to(&identity(&[]));
        assert_eq!(
            filter.email,
            Some(Email::parse("someone@example.com").unwrap())
        );
    }

    #[test]
    fn test_courier_is_not_admin_for_listing() {
        let filter = orders_visible_to(&identity(&[Role::Courier]));
        assert!(filter.email.is_some());
    }

    #[test]
    fn test_deliveries_cover_confirmed_and_fulfilling() {
        let courier = UserId::generate();
        let filter = deliveries_of(courier);
        assert_eq!(filter.deliverer, Some(courier));
        assert_eq!(
            filter.statuses.unwrap(),
            vec![OrderStatus::Confirmed, OrderStatus::Fulfilling]
        );
    }

    #[test]
    fn test_pickups_cover_accepted_and_ready() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let filter = pickups_of(UserId::generate(), today);
        assert_eq!(filter.pickup_from, Some(today));
        assert_eq!(
            filter.statuses.unwrap(),
            vec![ShopOrderStatus::Accepted, ShopOrderStatus::Ready]
        );
    }
}
