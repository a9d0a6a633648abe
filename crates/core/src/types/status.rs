//! Status enums for orders and shop-orders.
//!
//! Both enums travel over the wire and through the database as their integer
//! codes, so the discriminants below are a contract with existing clients.

use serde::{Deserialize, Serialize};

/// Error returned when an integer is not a known status code.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown {kind} status code: {code}")]
pub struct UnknownStatus {
    /// Which status family was being decoded.
    pub kind: &'static str,
    /// The rejected code.
    pub code: i16,
}

/// Lifecycle of a checkout order as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "i16", into = "i16")]
pub enum OrderStatus {
    /// Created by the buyer, waiting on shops.
    #[default]
    Placed = 1,
    /// Acknowledged by staff.
    Confirmed = 2,
    /// Every shop has accepted its slice.
    Fulfilling = 3,
    /// Delivered to the buyer.
    Completed = 4,
    /// Cancelled by the buyer, staff, or a missing shop.
    Cancelled = 5,
}

impl OrderStatus {
    /// Every status, in code order.
    pub const ALL: [Self; 5] = [
        Self::Placed,
        Self::Confirmed,
        Self::Fulfilling,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Integer code used on the wire and in storage.
    #[must_use]
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// `Completed` and `Cancelled` end the lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses a courier sees in their delivery list.
    #[must_use]
    pub const fn is_in_delivery(self) -> bool {
        matches!(self, Self::Confirmed | Self::Fulfilling)
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = UnknownStatus;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Placed),
            2 => Ok(Self::Confirmed),
            3 => Ok(Self::Fulfilling),
            4 => Ok(Self::Completed),
            5 => Ok(Self::Cancelled),
            _ => Err(UnknownStatus { kind: "order", code }),
        }
    }
}

impl From<OrderStatus> for i16 {
    fn from(status: OrderStatus) -> Self {
        status.code()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Fulfilling => "fulfilling",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one shop's slice of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "i16", into = "i16")]
pub enum ShopOrderStatus {
    /// Waiting for the shop to respond.
    #[default]
    Pending = 0,
    /// The shop will supply its lines.
    Accepted = 1,
    /// Packed and ready for the collector.
    Ready = 2,
    /// Dropped from the order.
    Cancelled = 3,
    /// Picked up by the collector.
    Fulfilled = 4,
}

impl ShopOrderStatus {
    /// Every status, in code order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Accepted,
        Self::Ready,
        Self::Cancelled,
        Self::Fulfilled,
    ];

    /// Integer code used on the wire and in storage.
    #[must_use]
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Codes of 3 and above have left the active pool.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.code() > Self::Ready.code()
    }

    /// Statuses a courier sees in their pickup list.
    #[must_use]
    pub const fn is_awaiting_pickup(self) -> bool {
        matches!(self, Self::Accepted | Self::Ready)
    }
}

impl TryFrom<i16> for ShopOrderStatus {
    type Error = UnknownStatus;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Ready),
            3 => Ok(Self::Cancelled),
            4 => Ok(Self::Fulfilled),
            _ => Err(UnknownStatus {
                kind: "shop order",
                code,
            }),
        }
    }
}

impl From<ShopOrderStatus> for i16 {
    fn from(status: ShopOrderStatus) -> Self {
        status.code()
    }
}

impl std::fmt::Display for ShopOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Ready => "ready",
            Self::Cancelled => "cancelled",
            Self::Fulfilled => "fulfilled",
        };
        f.write_str(name)
    }
}
