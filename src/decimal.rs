use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// Money type with 2 decimal places (shillings and cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

fn round_cents(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(round_cents(d))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(round_cents(Decimal::from_str(s)?)))
    }

    /// create from whole shillings
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from cents
    pub fn from_minor(amount: i64) -> Self {
        Money(round_cents(Decimal::new(amount, 2)))
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

    /// apply a percentage (e.g., 70% of 2500)
    pub fn percentage(&self, pct: Percentage) -> Self {
        Money(round_cents(self.0 * pct.as_decimal() / Decimal::from(100)))
    }

    /// share of `whole` this amount represents, in percent
    pub fn ratio_of(&self, whole: Money) -> Option<Decimal> {
        if whole.is_zero() {
            return None;
        }
        Some(self.0 / whole.0 * Decimal::from(100))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
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
        Money(round_cents(self.0 + other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = round_cents(self.0 + other.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(round_cents(self.0 - other.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = round_cents(self.0 - other.0);
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money(round_cents(self.0 * other))
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, quantity: u32) -> Money {
        Money(round_cents(self.0 * Decimal::from(quantity)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// percentage in the closed range [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);
    pub const HUNDRED: Percentage = Percentage(Decimal::ONE_HUNDRED);

    /// create from a decimal percentage, rejecting values outside [0, 100]
    pub fn new(value: Decimal) -> Option<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return None;
        }
        Some(Percentage(value))
    }

    /// create from a whole percentage, clamped to 100
    pub fn from_whole(value: u32) -> Self {
        Percentage(Decimal::from(value.min(100)))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = String;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Percentage::new(value).ok_or_else(|| format!("percentage {} outside [0, 100]", value))
    }
}

impl From<Percentage> for Decimal {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_to_cents() {
        let m = Money::from_str_exact("100.125").unwrap();
        assert_eq!(m.to_string(), "100.13");

        let m = Money::from_str_exact("0.004").unwrap();
        assert!(m.is_zero());
    }

    #[test]
    fn test_percentage_of_pending_payments() {
        let pending = Money::from_major(2_500);
        let limit = pending.percentage(Percentage::from_whole(70));
        assert_eq!(limit, Money::from_major(1_750));
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(Percentage::new(dec!(100)).is_some());
        assert!(Percentage::new(dec!(0)).is_some());
        assert!(Percentage::new(dec!(100.01)).is_none());
        assert!(Percentage::new(dec!(-1)).is_none());
        assert_eq!(Percentage::from_whole(250), Percentage::HUNDRED);
    }

    #[test]
    fn test_percentage_rejects_out_of_range_json() {
        let parsed: Result<Percentage, _> = serde_json::from_str("\"101\"");
        assert!(parsed.is_err());

        let parsed: Percentage = serde_json::from_str("\"62.5\"").unwrap();
        assert_eq!(parsed.as_decimal(), dec!(62.5));
    }

    #[test]
    fn test_saturating_sub_and_sum() {
        let total: Money = vec![Money::from_major(1_000), Money::from_minor(150_050)]
            .into_iter()
            .sum();
        assert_eq!(total.to_string(), "2500.50");
        assert_eq!(Money::from_major(5).saturating_sub(Money::from_major(9)), Money::ZERO);
    }

    #[test]
    fn test_ratio_of() {
        let used = Money::from_major(85_000);
        let max = Money::from_major(100_000);
        assert_eq!(used.ratio_of(max), Some(dec!(85)));
        assert_eq!(used.ratio_of(Money::ZERO), None);
    }
}
