//! Exact two-place monetary amounts.
//!
//! Order totals are always held at cent precision. Rounding happens once, when
//! a raw [`Decimal`] becomes [`Money`], and uses half-away-from-zero so that
//! `0.005` becomes `0.01`.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A non-negative amount rounded to two decimal places.
///
/// Serialized as a string with exactly two places (`"25.00"`).
///
/// ```
/// use harvest_core::Money;
/// use rust_decimal::Decimal;
///
/// let total = Money::from_decimal(Decimal::new(24995, 3)); // 24.995
/// assert_eq!(total.to_string(), "25.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Round a raw decimal to cents.
    #[must_use]
    pub fn from_decimal(amount: Decimal) -> Self {
        let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        Self(rounded)
    }

    /// Underlying decimal value.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Subtract `other`, stopping at zero.
    ///
    /// A total is never driven negative even if earlier adjustments already
    /// removed part of it.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO.rescaled()
        } else {
            Self::from_decimal(self.0 - other.0)
        }
    }

    fn rescaled(mut self) -> Self {
        self.0.rescale(2);
        self
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::from_decimal(amount)
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(Money::from_decimal(dec("0.005")).to_string(), "0.01");
        assert_eq!(Money::from_decimal(dec("0.015")).to_string(), "0.02");
        assert_eq!(Money::from_decimal(dec("2.675")).to_string(), "2.68");
        assert_eq!(Money::from_decimal(dec("2.674")).to_string(), "2.67");
    }

    #[test]
    fn test_saturating_sub() {
        let total = Money::from_decimal(dec("25.00"));
        assert_eq!(
            total.saturating_sub(Money::from_decimal(dec("5"))).to_string(),
            "20.00"
        );
        assert_eq!(
            total.saturating_sub(Money::from_decimal(dec("30"))),
            Money::ZERO
        );
    }

    #[test]
    fn test_serde_as_string() {
        let money = Money::from_decimal(dec("7.5"));
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"7.50\"");
        let parsed: Money = serde_json::from_str("\"7.50\"").unwrap();
        assert_eq!(parsed, money);
    }
}
