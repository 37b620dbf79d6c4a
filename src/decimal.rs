use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// number of decimal places carried by every amount
pub const SCALE: u32 = 2;

/// Money type with 2 decimal places, always held as whole cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, SCALE));

    /// create from decimal, rounding half away from zero at the cent
    pub fn from_decimal(d: Decimal) -> Self {
        Money(normalize(d))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(normalize(Decimal::from_str(s.trim())?)))
    }

    /// create from integer amount (dollars)
    pub fn from_major(amount: i64) -> Self {
        Money(normalize(Decimal::from(amount)))
    }

    /// create from cents
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, SCALE))
    }

    /// amount expressed as whole cents
    pub fn cents(&self) -> i64 {
        (self.0 * hundred()).trunc().to_i64().unwrap_or_default()
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// subtraction floored at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        (self - other).max(Money::ZERO)
    }

    /// split into `parts` equal shares, each floored to the cent
    pub fn floor_div(&self, parts: u32) -> Self {
        if parts == 0 {
            return *self;
        }
        let share = self.0 / Decimal::from(parts);
        Money(pin_scale(share.round_dp_with_strategy(SCALE, RoundingStrategy::ToNegativeInfinity)))
    }

    /// ratio of self over `whole` as a percentage rounded to whole units
    pub fn percent_of(&self, whole: Money) -> Decimal {
        if whole.is_zero() {
            return Decimal::ZERO;
        }
        (self.0 * hundred() / whole.0).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }
}

fn hundred() -> Decimal {
    Decimal::from(100)
}

fn normalize(d: Decimal) -> Decimal {
    pin_scale(d.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// pin the scale at 2 so equal amounts print identically
fn pin_scale(mut d: Decimal) -> Decimal {
    d.rescale(SCALE);
    d
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(normalize(self.0 + other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(normalize(self.0 - other.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        *self = *self - other;
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, times: u32) -> Money {
        Money(normalize(self.0 * Decimal::from(times)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_precision() {
        let m = Money::from_str_exact("100.125").unwrap();
        assert_eq!(m.to_string(), "100.13");

        let m = Money::from_str_exact("7").unwrap();
        assert_eq!(m.to_string(), "7.00");
    }

    #[test]
    fn test_cents_round_trip() {
        let m = Money::from_cents(3334);
        assert_eq!(m, Money::from_decimal(dec!(33.34)));
        assert_eq!(m.cents(), 3334);
        assert_eq!(Money::from_major(-2).cents(), -200);
    }

    #[test]
    fn test_floor_div() {
        assert_eq!(Money::from_major(100).floor_div(3), Money::from_decimal(dec!(33.33)));
        assert_eq!(Money::from_major(80).floor_div(4), Money::from_major(20));
        assert_eq!(Money::from_decimal(dec!(0.05)).floor_div(12), Money::ZERO);
    }

    #[test]
    fn test_no_drift_on_repeated_cents() {
        // ten cents added one hundred times is exactly ten dollars
        let total: Money = std::iter::repeat(Money::from_decimal(dec!(0.10))).take(100).sum();
        assert_eq!(total, Money::from_major(10));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::from_major(5);
        let b = Money::from_major(8);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::from_major(3));
    }

    #[test]
    fn test_percent_of() {
        let paid = Money::from_major(1);
        let total = Money::from_major(3);
        assert_eq!(paid.percent_of(total), dec!(33));
        assert_eq!(paid.percent_of(Money::ZERO), Decimal::ZERO);
    }
}
