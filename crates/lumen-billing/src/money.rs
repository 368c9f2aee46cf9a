//! Integer minor-unit money.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use lumen_core::error::DomainError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money in minor units (cents).
///
/// Serialized as a bare integer so it crosses the wire without any
/// floating-point step.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Rounds a decimal amount to cents, half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the amount does not fit in `i64`
    /// minor units.
    pub fn from_decimal(amount: Decimal) -> Result<Self, DomainError> {
        amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Self)
            .ok_or_else(|| DomainError::Validation(format!("amount {amount} is out of range")))
    }

    /// The amount as a decimal with two fractional digits.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns `true` for amounts below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_decimal_rounds_half_up() {
        assert_eq!(Money::from_decimal(dec("2.475")).unwrap(), Money::from_minor(248));
        assert_eq!(Money::from_decimal(dec("2.474")).unwrap(), Money::from_minor(247));
        assert_eq!(Money::from_decimal(dec("107.6890625")).unwrap(), Money::from_minor(10_769));
        assert_eq!(Money::from_decimal(dec("0.005")).unwrap(), Money::from_minor(1));
    }

    #[test]
    fn test_from_decimal_rejects_out_of_range() {
        let huge = Decimal::MAX;
        assert!(matches!(Money::from_decimal(huge), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_display_keeps_two_decimals() {
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
        assert_eq!(Money::from_minor(10_769).to_string(), "107.69");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
    }

    #[test]
    fn test_serializes_as_minor_units() {
        let json = serde_json::to_value(Money::from_minor(3334)).unwrap();
        assert_eq!(json, serde_json::json!(3334));
    }

    #[test]
    fn test_sum_adds_minor_units() {
        let total: Money = [3333, 3333, 3334].into_iter().map(Money::from_minor).sum();
        assert_eq!(total, Money::from_minor(10_000));
    }
}
